//! Process executor - runs a host-requested command to completion
//!
//! The child gets the merged environment, a null stdin and two separate
//! pipes for stdout and stderr. Output is captured as bytes and decoded
//! lossily so the response is always valid text.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::env::{ambient_environment, build_environment, is_valid_env_name, Environment};
use crate::protocol::{ExecuteRequest, ExecuteResult};

/// Launch-time failures. The command never ran, so there is no exit code.
#[derive(Debug)]
pub enum ExecError {
    /// `cmd` was absent or empty
    NoCommand,
    /// An `env` override key is empty or contains `=` or NUL
    InvalidEnvName(String),
    /// `cwd` does not exist
    MissingWorkingDir(PathBuf),
    /// `cwd` exists but is not a directory
    NotADirectory(PathBuf),
    /// The program could not be started (not found, not executable, ...)
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// Collecting output or the exit status failed
    Wait(std::io::Error),
    /// The child outlived its timeout and was killed
    TimedOut(Duration),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::NoCommand => write!(f, "No cmd"),
            ExecError::InvalidEnvName(name) => {
                write!(f, "Illegal environment variable name: {:?}", name)
            }
            ExecError::MissingWorkingDir(path) => {
                write!(f, "Working directory does not exist: {}", path.display())
            }
            ExecError::NotADirectory(path) => {
                write!(f, "Working directory is not a directory: {}", path.display())
            }
            ExecError::Spawn { program, source } => {
                write!(f, "Failed to start '{}': {}", program, source)
            }
            ExecError::Wait(e) => write!(f, "Failed to collect process output: {}", e),
            ExecError::TimedOut(limit) => {
                write!(f, "Command timed out after {}ms", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Spawn { source, .. } => Some(source),
            ExecError::Wait(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs `execute` requests against a fixed base environment
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    base_env: Environment,
    default_timeout: Option<Duration>,
}

impl ProcessExecutor {
    /// Executor whose children inherit the agent's environment as of now
    pub fn from_current_env() -> Self {
        Self::with_environment(ambient_environment())
    }

    /// Executor with an explicit base environment
    pub fn with_environment(base_env: Environment) -> Self {
        Self {
            base_env,
            default_timeout: None,
        }
    }

    /// Timeout applied when a request doesn't carry `timeoutMs`
    pub fn with_default_timeout(mut self, limit: Option<Duration>) -> Self {
        self.default_timeout = limit;
        self
    }

    /// Run the command to completion and report how it exited
    ///
    /// # Returns
    /// `Ok` whenever the process started and exited, whatever its exit code.
    /// `Err` only when it never ran (or had to be killed on timeout).
    pub async fn execute(&self, req: ExecuteRequest) -> Result<ExecuteResult, ExecError> {
        let ExecuteRequest {
            cmd,
            cwd,
            env,
            token,
            timeout_ms,
        } = req;

        let (program, args) = cmd.split_first().ok_or(ExecError::NoCommand)?;
        if let Some(name) = env.keys().find(|name| !is_valid_env_name(name)) {
            return Err(ExecError::InvalidEnvName(name.clone()));
        }
        if let Some(dir) = &cwd {
            check_working_dir(dir)?;
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .env_clear()
            .envs(build_environment(&self.base_env, &env))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cwd {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let child = command.spawn().map_err(|source| {
            warn!(program = %program, error = %source, "failed to spawn child");
            ExecError::Spawn {
                program: program.clone(),
                source,
            }
        })?;
        debug!(program = %program, pid = ?child.id(), "child spawned");

        // Dropping the wait future on timeout drops the child, and
        // kill_on_drop sends it SIGKILL.
        let output = match timeout_ms.map(Duration::from_millis).or(self.default_timeout) {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(program = %program, limit_ms = limit.as_millis() as u64, "child timed out, killed");
                    return Err(ExecError::TimedOut(limit));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(ExecError::Wait)?;

        let exit_code = exit_code(output.status);
        info!(
            program = %program,
            exit_code,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "child exited"
        );

        Ok(ExecuteResult {
            token,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn check_working_dir(dir: &Path) -> Result<(), ExecError> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ExecError::NotADirectory(dir.to_path_buf())),
        Err(_) => Err(ExecError::MissingWorkingDir(dir.to_path_buf())),
    }
}

/// Exit code as reported to the host: the status code, or the negated
/// signal number when the child was killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}
