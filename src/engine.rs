//! Invocation of the external `sambamba` engine.
//!
//! Each running stream owns one child process. Standard output is consumed
//! on the caller's thread; standard error is drained in full by a helper
//! thread and only inspected once the child has exited. Dropping an
//! [`EngineProcess`] before [`EngineProcess::finish`] kills and reaps the
//! child.

use std::ffi::OsString;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable overriding the engine executable.
pub const ENGINE_ENV_VAR: &str = "SAMBAMBA";

const DEFAULT_PROGRAM: &str = "sambamba";

/// How to launch the engine: executable plus arguments placed before the
/// per-invocation arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Engine {
    /// Launch `program` directly.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Resolve the executable from `$SAMBAMBA`, falling back to `sambamba` on `PATH`.
    pub fn from_env() -> Self {
        let program = std::env::var_os(ENGINE_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));
        Self::new(program)
    }

    /// Arguments inserted before every invocation's own arguments.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Executable path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Start the engine with `args`, piping stdout and stderr.
    pub fn spawn(&self, args: &[String]) -> Result<EngineProcess> {
        let command_line = self.command_line(args);
        debug!(command = %command_line, "spawning engine");

        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Both handles exist because both streams were configured as piped.
        let (Some(stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "engine pipes were not captured",
            )));
        };

        let stderr = thread::spawn(move || {
            let mut captured = String::new();
            stderr.read_to_string(&mut captured).map(|_| captured)
        });

        Ok(EngineProcess {
            child,
            stdout: BufReader::new(stdout),
            stderr: Some(stderr),
            command_line,
            finished: false,
        })
    }

    /// Run to completion and return everything written to stdout.
    pub fn run(&self, args: &[String]) -> Result<String> {
        let mut process = self.spawn(args)?;
        let mut output = String::new();
        process.stdout().read_to_string(&mut output)?;
        process.finish()?;
        Ok(output)
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(
            self.leading_args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::from_env()
    }
}

/// A running engine invocation.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<io::Result<String>>>,
    command_line: String,
    finished: bool,
}

impl EngineProcess {
    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Buffered standard output of the child.
    pub fn stdout(&mut self) -> &mut BufReader<ChildStdout> {
        &mut self.stdout
    }

    /// Wait for exit and surface any stderr output or abnormal status.
    ///
    /// Stderr is checked before the exit status because the engine reports
    /// some problems on stderr while still exiting with status 0.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = match self.stderr.take().map(JoinHandle::join) {
            Some(Ok(captured)) => captured?,
            Some(Err(_)) => String::from("<stderr reader panicked>"),
            None => String::new(),
        };

        if !stderr.is_empty() {
            warn!(command = %self.command_line, %status, "engine wrote to stderr");
            return Err(self.failure(status, stderr));
        }
        if !status.success() {
            return Err(self.failure(status, stderr));
        }

        debug!(command = %self.command_line, "engine finished");
        Ok(())
    }

    fn failure(&self, status: ExitStatus, stderr: String) -> Error {
        Error::ExternalProcess {
            command: self.command_line.clone(),
            status: status.to_string(),
            stderr,
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Abandoned early: terminate rather than let the child run on.
        if let Err(err) = self.child.kill() {
            debug!(error = %err, "engine already exited");
        }
        let _ = self.child.wait();
        debug!(command = %self.command_line, "engine terminated early");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Engine {
        Engine::new("sh").with_leading_args(["-c", script, "engine"])
    }

    #[test]
    fn test_run_collects_stdout() {
        let output = shell("echo \"$@\"").run(&["view".into(), "-c".into()]).unwrap();
        assert_eq!(output.trim(), "view -c");
    }

    #[test]
    fn test_stderr_fails_even_on_success_status() {
        let err = shell("echo warning >&2; exit 0").run(&[]).unwrap_err();
        match err {
            Error::ExternalProcess { stderr, .. } => assert_eq!(stderr, "warning\n"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nonzero_exit_fails() {
        let err = shell("exit 3").run(&[]).unwrap_err();
        assert!(matches!(err, Error::ExternalProcess { ref stderr, .. } if stderr.is_empty()));
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let err = Engine::new("/nonexistent/sambamba").run(&[]).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[test]
    fn test_command_line_includes_leading_args() {
        let engine = Engine::new("sambamba").with_leading_args(["--verbose"]);
        assert_eq!(
            engine.command_line(&["view".to_string()]),
            "sambamba --verbose view"
        );
    }
}
