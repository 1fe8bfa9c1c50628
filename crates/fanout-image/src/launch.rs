//! Local launch of an image's entry command.
//!
//! Mirrors what the container runtime does with the launch instruction: one
//! foreground child with the caller's stdio, whose exit status becomes ours.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// Exit code reported when the entry program cannot be found
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the entry program exists but cannot be started
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Container lifecycle. `Exited` is terminal; a new run needs a new launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    Unbuilt,
    Built,
    Running,
    Exited(i32),
}

impl Lifecycle {
    fn name(&self) -> &'static str {
        match self {
            Lifecycle::Unbuilt => "unbuilt",
            Lifecycle::Built => "built",
            Lifecycle::Running => "running",
            Lifecycle::Exited(_) => "exited",
        }
    }

    pub fn build(self) -> Result<Self, LifecycleError> {
        match self {
            Lifecycle::Unbuilt => Ok(Lifecycle::Built),
            other => Err(LifecycleError::new(other, "build")),
        }
    }

    pub fn start(self) -> Result<Self, LifecycleError> {
        match self {
            Lifecycle::Built => Ok(Lifecycle::Running),
            other => Err(LifecycleError::new(other, "start")),
        }
    }

    pub fn exit(self, code: i32) -> Result<Self, LifecycleError> {
        match self {
            Lifecycle::Running => Ok(Lifecycle::Exited(code)),
            other => Err(LifecycleError::new(other, "exit")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {event} from state {from}")]
pub struct LifecycleError {
    pub from: &'static str,
    pub event: &'static str,
}

impl LifecycleError {
    fn new(from: Lifecycle, event: &'static str) -> Self {
        Self {
            from: from.name(),
            event,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("launch command is empty")]
    EmptyCommand,
    #[error("entry program {program} not found")]
    EntryNotFound { program: String },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Runs one launch command through the lifecycle.
#[derive(Debug)]
pub struct Launcher {
    argv: Vec<String>,
    workdir: Option<PathBuf>,
    state: Lifecycle,
}

impl Launcher {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            workdir: None,
            state: Lifecycle::Unbuilt,
        }
    }

    /// Run the child in `dir` instead of the current directory
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Fix the command. The entry program is not looked up here; a missing
    /// binary only shows when the launcher runs.
    pub fn build(&mut self) -> Result<(), LaunchError> {
        if self.argv.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        self.state = self.state.build()?;
        debug!(argv = ?self.argv, "launcher built");
        Ok(())
    }

    /// Start the child, wait for it, and return the code the container
    /// would exit with.
    pub fn run(&mut self) -> Result<i32, LaunchError> {
        self.state = self.state.start()?;

        let (program, args) = match self.argv.split_first() {
            Some(split) => split,
            None => return Err(LaunchError::EmptyCommand),
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        info!(program = %program, args = ?args, "launching");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let program = program.clone();
                return Err(if e.kind() == io::ErrorKind::NotFound {
                    self.state = self.state.exit(EXIT_NOT_FOUND)?;
                    warn!(program = %program, "entry program not found");
                    LaunchError::EntryNotFound { program }
                } else {
                    self.state = self.state.exit(EXIT_NOT_EXECUTABLE)?;
                    LaunchError::Spawn { program, source: e }
                });
            }
        };

        let status = child.wait().map_err(|source| LaunchError::Wait {
            program: program.clone(),
            source,
        })?;
        let code = exit_code(status);
        self.state = self.state.exit(code)?;

        info!(program = %program, code, "process exited");
        Ok(code)
    }
}

/// Exit code as a shell reports it: the process's own code, or 128 plus the
/// signal that killed it.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(argv: &[&str]) -> Launcher {
        let mut launcher = Launcher::new(argv.iter().map(|s| s.to_string()).collect());
        launcher.build().unwrap();
        launcher
    }

    #[test]
    fn test_lifecycle_transitions() {
        let state = Lifecycle::Unbuilt.build().unwrap();
        assert_eq!(state, Lifecycle::Built);
        let state = state.start().unwrap();
        assert_eq!(state, Lifecycle::Running);
        let state = state.exit(0).unwrap();
        assert_eq!(state, Lifecycle::Exited(0));

        let err = state.start().unwrap_err();
        assert_eq!(err.to_string(), "cannot start from state exited");
        assert!(Lifecycle::Unbuilt.start().is_err());
        assert!(Lifecycle::Built.build().is_err());
        assert!(Lifecycle::Built.exit(1).is_err());
    }

    #[test]
    fn test_empty_command_never_builds() {
        let mut launcher = Launcher::new(Vec::new());
        assert!(matches!(launcher.build(), Err(LaunchError::EmptyCommand)));
        assert_eq!(launcher.state(), Lifecycle::Unbuilt);
    }

    #[test]
    fn test_run_requires_build() {
        let mut launcher = Launcher::new(vec!["true".to_string()]);
        assert!(matches!(launcher.run(), Err(LaunchError::Lifecycle(_))));
    }

    #[test]
    fn test_missing_entry_fails_at_run_not_build() {
        let mut launcher = launcher(&["/nonexistent/fanout-gateway"]);
        assert_eq!(launcher.state(), Lifecycle::Built);

        match launcher.run() {
            Err(LaunchError::EntryNotFound { program }) => {
                assert_eq!(program, "/nonexistent/fanout-gateway")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(launcher.state(), Lifecycle::Exited(EXIT_NOT_FOUND));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_is_mirrored() {
        let mut launcher = launcher(&["sh", "-c", "exit 3"]);
        assert_eq!(launcher.run().unwrap(), 3);
        assert_eq!(launcher.state(), Lifecycle::Exited(3));

        // exited is terminal
        assert!(matches!(launcher.run(), Err(LaunchError::Lifecycle(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_death_maps_to_128_plus_signal() {
        let mut launcher = launcher(&["sh", "-c", "kill -TERM $$"]);
        assert_eq!(launcher.run().unwrap(), 128 + 15);
    }

    #[cfg(unix)]
    #[test]
    fn test_workdir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();

        let mut launcher = launcher(&["sh", "-c", "test -f marker"]).with_workdir(dir.path());
        assert_eq!(launcher.run().unwrap(), 0);
    }
}
