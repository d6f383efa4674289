#![allow(unsafe_code)]

//! Supervision of the managed child process.
//!
//! Each spawned child gets one exit-watch thread which posts the child's exit
//! record, exactly once, into a single-slot [`ExitSignal`]. Stopping probes
//! that slot first and only signals a child that has not exited yet. The
//! probe and the signal happen under the slot's lock, and the exit-watch
//! thread only reaps the child while holding that same lock, so a pid is
//! never signalled after it was reaped.

use std::io;
use std::mem;
use std::process::{Child, ExitStatus, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::shell::Shell;

/// Outcome of waiting on a child.
pub type ExitRecord = io::Result<ExitStatus>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Exited,
}

/// How a call to [`stop_if_running`] ended.
#[derive(Debug)]
pub enum Stopped {
    /// The process had already exited on its own; it was not signalled.
    Exited(ExitRecord),
    /// The process was interrupted and has since exited.
    Interrupted(ExitRecord),
    /// The process could not be signalled and was left to exit on its own.
    Abandoned(io::Error),
}

enum Slot {
    Pending,
    Posted(ExitRecord),
    Taken,
}

impl Slot {
    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    fn post(&mut self, record: ExitRecord) {
        if self.is_pending() {
            *self = Slot::Posted(record);
        } else {
            warn!("Discarding second exit record: {:?}", record);
        }
    }

    fn take(&mut self) -> Option<ExitRecord> {
        match mem::replace(self, Slot::Taken) {
            Slot::Posted(record) => Some(record),
            Slot::Pending => {
                *self = Slot::Pending;
                None
            }
            Slot::Taken => None,
        }
    }
}

/// Single-slot completion signal shared by a [`ManagedProcess`] and its
/// exit-watch thread.
struct ExitSignal {
    slot: Mutex<Slot>,
    cvar: Condvar,
}

impl ExitSignal {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_posted<'a>(&self, mut slot: MutexGuard<'a, Slot>) -> MutexGuard<'a, Slot> {
        while slot.is_pending() {
            slot = self
                .cvar
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slot
    }
}

/// The currently supervised child.
///
/// Exclusively owned by the controller; stopping it consumes it.
#[derive(Debug)]
pub struct ManagedProcess {
    pid: u32,
    exit: Arc<ExitSignal>,
    watcher: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ExitSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = match *self.lock() {
            Slot::Pending => "pending",
            Slot::Posted(_) => "posted",
            Slot::Taken => "taken",
        };
        f.debug_struct("ExitSignal").field("slot", &state).finish()
    }
}

impl ManagedProcess {
    /// Spawns `cmd` through `shell` with inherited stdio and starts watching
    /// for its exit.
    pub fn spawn(shell: &Shell, cmd: &str) -> io::Result<Self> {
        let mut command = shell.to_command(cmd);
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        imp::new_session(&mut command);
        debug!("Assembled command {:?}", command);

        let child = command.spawn()?;
        let pid = child.id();
        let exit = Arc::new(ExitSignal::new());

        let watcher = thread::Builder::new()
            .name(format!("exit-watch-{}", pid))
            .spawn({
                let exit = Arc::clone(&exit);
                move || watch_exit(child, &exit)
            })?;

        debug!("Started process {}", pid);
        Ok(Self {
            pid,
            exit,
            watcher: Some(watcher),
        })
    }

    pub fn id(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        if self.exit.lock().is_pending() {
            ProcessState::Running
        } else {
            ProcessState::Exited
        }
    }

    /// Ends the process if it is still running, and consumes its exit record.
    ///
    /// A process that already exited is not signalled and this returns
    /// without blocking. Otherwise it is interrupted and this blocks, with no
    /// timeout, until it has exited.
    pub fn stop(mut self) -> Stopped {
        let stopped = {
            let mut slot = self.exit.lock();

            if let Some(record) = slot.take() {
                Stopped::Exited(record)
            } else {
                info!("Killing program...");
                match imp::interrupt(self.pid) {
                    Ok(()) => {}
                    Err(ref err) if imp::is_gone(err) => {
                        debug!("Process {} is already gone: {}", self.pid, err);
                    }
                    Err(err) => {
                        error!("Unable to interrupt process {}: {}", self.pid, err);
                        return Stopped::Abandoned(err);
                    }
                }

                debug!("Waiting for process {} to exit...", self.pid);
                let mut slot = self.exit.wait_posted(slot);
                match slot.take() {
                    Some(record) => Stopped::Interrupted(record),
                    None => Stopped::Interrupted(Err(io::Error::new(
                        io::ErrorKind::Other,
                        "exit record already consumed",
                    ))),
                }
            }
        };

        if let Some(watcher) = self.watcher.take() {
            if watcher.join().is_err() {
                warn!("Exit-watch thread for process {} panicked", self.pid);
            }
        }

        stopped
    }
}

/// Body of the exit-watch thread.
fn watch_exit(mut child: Child, exit: &ExitSignal) {
    match imp::wait_without_reaping(child.id()) {
        Ok(()) => {
            let mut slot = exit.lock();
            let record = child.wait();
            slot.post(record);
        }
        Err(err) => {
            trace!("Waiting on process {} directly: {}", child.id(), err);
            let record = child.wait();
            exit.lock().post(record);
        }
    }

    exit.cvar.notify_all();
}

fn log_exit(stopped: &Stopped) {
    match stopped {
        Stopped::Exited(Ok(status)) => info!("Program exited on its own: {}", status),
        Stopped::Interrupted(Ok(status)) => debug!("Program stopped: {}", status),
        Stopped::Exited(Err(err)) | Stopped::Interrupted(Err(err)) => {
            warn!("Unable to wait for program: {}", err)
        }
        Stopped::Abandoned(_) => {}
    }
}

fn run_build(shell: &Shell, cmd: &str) -> Result<()> {
    info!("Rebuilding...");
    let mut command = shell.to_command(cmd);
    debug!("Assembled command {:?}", command);

    let status = command.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::Build(status))
    }
}

/// Runs the build command if there is one, then spawns the run command.
///
/// With an empty run command nothing is spawned and the change is only
/// reported.
pub fn start(config: &Config) -> Result<Option<ManagedProcess>> {
    if let Some(ref build) = config.build_cmd {
        run_build(&config.shell, build)?;
    }

    if config.cmd.trim().is_empty() {
        info!("Code change detected");
        return Ok(None);
    }

    info!("Running program...");
    Ok(Some(ManagedProcess::spawn(&config.shell, &config.cmd)?))
}

pub fn stop_if_running(process: Option<ManagedProcess>) -> Option<Stopped> {
    let stopped = process?.stop();
    log_exit(&stopped);
    Some(stopped)
}

/// Stops `previous`, waiting for it to be gone, then starts afresh.
pub fn restart(config: &Config, previous: Option<ManagedProcess>) -> Result<Option<ManagedProcess>> {
    stop_if_running(previous);
    start(config)
}

pub fn state_of(process: Option<&ManagedProcess>) -> ProcessState {
    process.map_or(ProcessState::NotStarted, ManagedProcess::state)
}

#[cfg(unix)]
mod imp {
    use nix::libc;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::{setsid, Pid};
    use nix::{self, Error};
    use std::convert::TryInto;
    use std::os::unix::process::CommandExt;
    use std::process::Command;
    use std::{io, mem};

    fn from_nix_error(err: nix::Error) -> io::Error {
        match err {
            Error::Sys(errno) => io::Error::from_raw_os_error(errno as i32),
            Error::InvalidPath => io::Error::new(io::ErrorKind::InvalidInput, err),
            _ => io::Error::new(io::ErrorKind::Other, err),
        }
    }

    /// Makes the child lead a new session, so its whole process tree can be
    /// signalled through its pid.
    pub fn new_session(command: &mut Command) {
        unsafe {
            command.pre_exec(|| setsid().map(|_| ()).map_err(from_nix_error));
        }
    }

    /// Blocks until the child has exited, leaving it unreaped.
    pub fn wait_without_reaping(pid: u32) -> io::Result<()> {
        loop {
            let mut info: libc::siginfo_t = unsafe { mem::zeroed() };
            let rc = unsafe {
                libc::waitid(
                    libc::P_PID,
                    pid as libc::id_t,
                    &mut info,
                    libc::WEXITED | libc::WNOWAIT,
                )
            };

            if rc == 0 {
                return Ok(());
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn interrupt(pid: u32) -> io::Result<()> {
        let pid: i32 = pid
            .try_into()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        debug!("Sending SIGINT to process group {}", pid);
        kill(Pid::from_raw(-pid), Signal::SIGINT).map_err(from_nix_error)
    }

    pub fn is_gone(err: &io::Error) -> bool {
        err.raw_os_error() == Some(libc::ESRCH)
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;
    use std::process::Command;

    pub fn new_session(_command: &mut Command) {}

    pub fn wait_without_reaping(_pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Other,
            "exit cannot be observed without reaping on this platform",
        ))
    }

    pub fn interrupt(pid: u32) -> io::Result<()> {
        let status = Command::new("taskkill")
            .args(&["/PID", &pid.to_string(), "/T", "/F"])
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("taskkill exited with {}", status),
            ))
        }
    }

    pub const fn is_gone(_err: &io::Error) -> bool {
        false
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::{restart, start, state_of, stop_if_running, ManagedProcess, ProcessState, Stopped};
    use crate::config::{Config, ConfigBuilder};
    use crate::error::Error;
    use crate::filter::FilterChain;
    use crate::shell::Shell;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    use std::os::unix::process::ExitStatusExt;
    use std::thread;
    use std::time::{Duration, Instant};

    fn config(build: Option<&str>, run: &str) -> Config {
        let mut builder = ConfigBuilder::default();
        builder
            .cmd(run)
            .dirs(vec![std::env::temp_dir()])
            .filters(FilterChain::defaults().unwrap());
        if let Some(build) = build {
            builder.build_cmd(build);
        }
        builder.build().unwrap()
    }

    fn wait_until_exited(process: &ManagedProcess) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while process.state() == ProcessState::Running {
            assert!(Instant::now() < deadline, "process did not exit");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn is_alive(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[test]
    fn empty_run_command_starts_nothing() {
        let process = start(&config(None, "")).unwrap();
        assert!(process.is_none());
        assert_eq!(state_of(process.as_ref()), ProcessState::NotStarted);
        assert!(stop_if_running(process).is_none());
    }

    #[test]
    fn exited_process_is_not_signalled() {
        let process = start(&config(None, "exit 3")).unwrap().unwrap();
        wait_until_exited(&process);
        assert_eq!(state_of(Some(&process)), ProcessState::Exited);

        let started = Instant::now();
        match stop_if_running(Some(process)) {
            Some(Stopped::Exited(Ok(status))) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn running_process_is_interrupted() {
        let process = start(&config(None, "exec sleep 30")).unwrap().unwrap();
        assert_eq!(process.state(), ProcessState::Running);

        let started = Instant::now();
        match process.stop() {
            Stopped::Interrupted(Ok(status)) => {
                assert_eq!(status.signal(), Some(nix::libc::SIGINT))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn restart_waits_for_previous_exit() {
        let config = config(None, "exec sleep 30");
        let previous = start(&config).unwrap().unwrap();
        let previous_pid = previous.id();

        let next = restart(&config, Some(previous)).unwrap().unwrap();
        assert!(!is_alive(previous_pid));
        assert!(is_alive(next.id()));
        assert_ne!(next.id(), previous_pid);

        assert!(matches!(next.stop(), Stopped::Interrupted(_)));
    }

    #[test]
    fn restart_reaches_forked_program() {
        let config = config(None, "sleep 30; true");
        let previous = start(&config).unwrap().unwrap();
        let previous_pid = previous.id();
        thread::sleep(Duration::from_millis(300));

        let started = Instant::now();
        let next = restart(&config, Some(previous)).unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!is_alive(previous_pid));

        assert!(matches!(next.stop(), Stopped::Interrupted(_)));
    }

    #[test]
    fn failed_build_skips_run() {
        match start(&config(Some("exit 1"), "exec sleep 30")) {
            Err(Error::Build(status)) => assert_eq!(status.code(), Some(1)),
            other => panic!("unexpected outcome: {:?}", other.map(|p| p.is_some())),
        }
    }

    #[test]
    fn build_then_report_change() {
        assert!(start(&config(Some("true"), "")).unwrap().is_none());
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let result = ManagedProcess::spawn(&Shell::Unix("/nonexistent/shell".into()), "true");
        assert!(result.is_err());
    }
}
