//! Reads the import declarations of Go source files.
//!
//! Only the package clause and the import declarations that follow it are
//! scanned; the rest of the file is never looked at, so a body that would not
//! compile still yields its imports.

use std::{fmt, fs, iter::Peekable, path::Path, str::CharIndices};

use crate::error::{Error, Result};

/// Extension of files whose imports are followed.
pub const MODULE_EXTENSION: &str = "go";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

pub fn is_module_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == MODULE_EXTENSION)
}

/// Reads `path` and returns its distinct import paths, in source order.
pub fn parse_file(path: &Path) -> Result<Vec<String>> {
    let source = fs::read_to_string(path)?;
    parse_imports(&source).map_err(|e| Error::Parse(path.to_owned(), e))
}

/// Returns the distinct import paths declared in `source`, in source order.
pub fn parse_imports(source: &str) -> std::result::Result<Vec<String>, ParseError> {
    let mut parser = Parser::new(source);
    parser.package_clause()?;

    let mut imports: Vec<String> = Vec::new();
    loop {
        match parser.peek()? {
            Token::Semicolon => {
                parser.bump()?;
            }
            Token::Ident(ref kw) if kw == "import" => {
                parser.bump()?;
                for path in parser.import_decl()? {
                    if !imports.contains(&path) {
                        imports.push(path);
                    }
                }
            }
            _ => break,
        }
    }

    Ok(imports)
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Semicolon,
    Dot,
    Other(char),
    Eof,
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        let mut chars = source.char_indices().peekable();
        if chars.peek().map(|&(_, c)| c) == Some('\u{feff}') {
            chars.next();
        }

        Self { chars, line: 1 }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next().map(|(_, c)| c);
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_trivia(&mut self) -> std::result::Result<(), ParseError> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.next_char();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek().map(|&(_, c)| c) {
                        Some('/') => {
                            while let Some(c) = self.next_char() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            let start = self.line;
                            self.next_char();
                            self.next_char();
                            let mut closed = false;
                            while let Some(c) = self.next_char() {
                                if c == '*' && self.peek_char() == Some('/') {
                                    self.next_char();
                                    closed = true;
                                    break;
                                }
                            }
                            if !closed {
                                return Err(ParseError {
                                    line: start,
                                    message: "comment not terminated".into(),
                                });
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> std::result::Result<Token, ParseError> {
        self.skip_trivia()?;

        let c = match self.next_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        Ok(match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            '"' => Token::Str(self.interpreted_string()?),
            '`' => Token::Str(self.raw_string()?),
            c if c == '_' || c.is_alphanumeric() => {
                let mut ident = c.to_string();
                while let Some(c) = self.peek_char() {
                    if c == '_' || c.is_alphanumeric() {
                        ident.push(c);
                        self.next_char();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            other => Token::Other(other),
        })
    }

    fn raw_string(&mut self) -> std::result::Result<String, ParseError> {
        let start = self.line;
        let mut value = String::new();
        loop {
            match self.next_char() {
                Some('`') => return Ok(value),
                Some('\r') => {}
                Some(c) => value.push(c),
                None => {
                    return Err(ParseError {
                        line: start,
                        message: "raw string literal not terminated".into(),
                    })
                }
            }
        }
    }

    fn interpreted_string(&mut self) -> std::result::Result<String, ParseError> {
        let start = self.line;
        let mut value = String::new();
        loop {
            match self.next_char() {
                Some('"') => return Ok(value),
                Some('\\') => value.push(self.escape()?),
                Some('\n') | None => {
                    return Err(ParseError {
                        line: start,
                        message: "string literal not terminated".into(),
                    })
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn escape(&mut self) -> std::result::Result<char, ParseError> {
        let c = self
            .next_char()
            .ok_or_else(|| self.error("escape sequence not terminated"))?;

        Ok(match c {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\\' => '\\',
            '"' => '"',
            'x' => self.hex_escape(2)?,
            'u' => self.hex_escape(4)?,
            'U' => self.hex_escape(8)?,
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    let digit = self
                        .next_char()
                        .and_then(|d| d.to_digit(8))
                        .ok_or_else(|| self.error("invalid octal escape"))?;
                    value = value * 8 + digit;
                }
                char::from_u32(value).ok_or_else(|| self.error("invalid octal escape"))?
            }
            other => return Err(self.error(format!("unknown escape sequence '\\{}'", other))),
        })
    }

    fn hex_escape(&mut self, digits: usize) -> std::result::Result<char, ParseError> {
        let mut value = 0;
        for _ in 0..digits {
            let digit = self
                .next_char()
                .and_then(|d| d.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or_else(|| self.error("escape is not a valid code point"))
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
        }
    }

    fn peek(&mut self) -> std::result::Result<Token, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.clone().unwrap_or(Token::Eof))
    }

    fn bump(&mut self) -> std::result::Result<Token, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn package_clause(&mut self) -> std::result::Result<(), ParseError> {
        match self.bump()? {
            Token::Ident(ref kw) if kw == "package" => {}
            _ => return Err(self.lexer.error("expected 'package' clause")),
        }

        match self.bump()? {
            Token::Ident(_) => Ok(()),
            _ => Err(self.lexer.error("expected package name")),
        }
    }

    fn import_decl(&mut self) -> std::result::Result<Vec<String>, ParseError> {
        if self.peek()? != Token::LParen {
            return Ok(vec![self.import_spec()?]);
        }

        self.bump()?;
        let mut paths = Vec::new();
        loop {
            match self.peek()? {
                Token::RParen => {
                    self.bump()?;
                    return Ok(paths);
                }
                Token::Semicolon => {
                    self.bump()?;
                }
                Token::Eof => return Err(self.lexer.error("import group not closed")),
                _ => paths.push(self.import_spec()?),
            }
        }
    }

    fn import_spec(&mut self) -> std::result::Result<String, ParseError> {
        match self.peek()? {
            Token::Ident(_) | Token::Dot => {
                self.bump()?;
            }
            _ => {}
        }

        match self.bump()? {
            Token::Str(path) if !path.is_empty() => Ok(path),
            Token::Str(_) => Err(self.lexer.error("empty import path")),
            other => Err(self
                .lexer
                .error(format!("expected import path, found {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{is_module_file, parse_imports};
    use std::path::Path;

    #[test]
    fn single_import() {
        let src = "package main\n\nimport \"fmt\"\n\nfunc main() { fmt.Println(1) }\n";
        assert_eq!(parse_imports(src).unwrap(), vec!["fmt".to_string()]);
    }

    #[test]
    fn grouped_imports_with_names() {
        let src = r#"// Command server.
package main

import (
	"net/http"
	log "github.com/sirupsen/logrus"
	. "pkg/util"
	_ "embed"
	`raw/path`
)

import "os"
"#;
        assert_eq!(
            parse_imports(src).unwrap(),
            vec!["net/http", "github.com/sirupsen/logrus", "pkg/util", "embed", "raw/path", "os"]
        );
    }

    #[test]
    fn comments_and_semicolons() {
        let src = "/* header\n   block */ package util; import (\"a\"; /* x */ \"b\") // trailing\nimport \"a\"";
        assert_eq!(parse_imports(src).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn stops_at_first_declaration() {
        let src = "package main\nimport \"fmt\"\nvar x = 1\nimport \"late\"\n";
        assert_eq!(parse_imports(src).unwrap(), vec!["fmt"]);
    }

    #[test]
    fn body_is_not_parsed() {
        let src = "package main\nimport \"fmt\"\nfunc main() { \"unterminated\n }";
        assert_eq!(parse_imports(src).unwrap(), vec!["fmt"]);
    }

    #[test]
    fn leading_byte_order_mark() {
        let src = "\u{feff}package main\n\nimport \"pkg/util\"\n";
        assert_eq!(parse_imports(src).unwrap(), vec!["pkg/util"]);
    }

    #[test]
    fn no_imports() {
        assert!(parse_imports("package empty\n").unwrap().is_empty());
    }

    #[test]
    fn escapes_in_paths() {
        let src = "package p\nimport \"a\\x2fb\"";
        assert_eq!(parse_imports(src).unwrap(), vec!["a/b"]);
    }

    #[test]
    fn missing_package_clause() {
        let err = parse_imports("import \"fmt\"").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unterminated_import_string() {
        let err = parse_imports("package main\n\nimport \"fmt\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("not terminated"));
    }

    #[test]
    fn unclosed_import_group() {
        assert!(parse_imports("package main\nimport (\n\"fmt\"\n").is_err());
    }

    #[test]
    fn unterminated_comment() {
        let err = parse_imports("package main\n/* oops").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn module_files_by_extension() {
        assert!(is_module_file(Path::new("/proj/main.go")));
        assert!(!is_module_file(Path::new("/proj/main.go.orig")));
        assert!(!is_module_file(Path::new("/proj/go")));
    }
}
