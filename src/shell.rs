use std::process::Command;

/// Shell to use to run the build and run commands.
///
/// `Cmd` and `Powershell` are special-cased because they have different calling
/// conventions. `Cmd` is only available in Windows, while `Powershell` is
/// also available on unices (provided the end-user has it installed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shell {
    /// Use the given string as a unix shell invocation.
    ///
    /// The program is invoked with `-c` followed by the command. The string
    /// is split on whitespace: first is the shell program, rest are extra
    /// arguments placed before the `-c`.
    Unix(String),

    /// Use the Windows CMD.EXE shell, invoked with `/C`.
    #[cfg(windows)]
    Cmd,

    /// Use Powershell, invoked with `-Command`.
    Powershell,
}

impl Default for Shell {
    #[cfg(windows)]
    fn default() -> Self {
        Self::Cmd
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self::Unix("sh".into())
    }
}

impl Shell {
    /// Picks the calling convention from a shell program name or path.
    pub fn from_program(program: &str) -> Self {
        let program = program.trim();
        let name = program
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(program)
            .to_ascii_lowercase();

        match name.as_str() {
            "" => Self::default(),
            #[cfg(windows)]
            "cmd" | "cmd.exe" => Self::Cmd,
            "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => Self::Powershell,
            _ => Self::Unix(program.to_owned()),
        }
    }

    /// Obtain a [`Command`] running `cmd` through this shell.
    pub fn to_command(&self, cmd: &str) -> Command {
        match self {
            #[cfg(windows)]
            Shell::Cmd => {
                let mut c = Command::new("cmd.exe");
                c.arg("/C").arg(cmd);
                c
            }

            Shell::Powershell if cfg!(windows) => {
                let mut c = Command::new("powershell.exe");
                c.arg("-Command").arg(cmd);
                c
            }

            Shell::Powershell => {
                let mut c = Command::new("pwsh");
                c.arg("-Command").arg(cmd);
                c
            }

            Shell::Unix(name) => {
                let mut sh = name.split_ascii_whitespace();
                let mut c = Command::new(sh.next().unwrap_or("sh"));
                c.args(sh);
                c.arg("-c").arg(cmd);
                c
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Shell;

    #[test]
    fn program_names() {
        assert_eq!(Shell::from_program("/bin/bash"), Shell::Unix("/bin/bash".into()));
        assert_eq!(Shell::from_program("zsh -o errexit"), Shell::Unix("zsh -o errexit".into()));
        assert_eq!(Shell::from_program("/usr/local/bin/pwsh"), Shell::Powershell);
        assert_eq!(Shell::from_program("  "), Shell::default());
    }

    #[test]
    #[cfg(unix)]
    fn unix_shell_default() -> Result<(), std::io::Error> {
        assert!(Shell::default().to_command("echo hi").status()?.success());
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn unix_shell_alternate_shopts() -> Result<(), std::io::Error> {
        assert!(Shell::Unix("sh -e".into())
            .to_command("false; echo unreachable")
            .status()
            .map(|s| !s.success())?);
        Ok(())
    }

    #[test]
    #[cfg(windows)]
    fn windows_shell_cmd() -> Result<(), std::io::Error> {
        assert!(Shell::Cmd.to_command("echo hi").status()?.success());
        Ok(())
    }
}
