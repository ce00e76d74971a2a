use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running command is polled for completion or deadline
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Environment for one external command: variables to set on top of the
/// inherited process environment, and variables to withhold from it.
#[derive(Debug, Clone, Default)]
pub struct ExecEnv {
    pub set: HashMap<String, String>,
    pub clear: Vec<String>,
}

impl ExecEnv {
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set.insert(key.into(), value.into());
    }

    pub fn clear_var(&mut self, key: impl Into<String>) {
        self.clear.push(key.into());
    }
}

/// Terminal state of one external command.
///
/// Nonzero exit and timeout are values rather than errors so the caller can
/// fail fast without exception-style control flow; `Err` is reserved for
/// spawn/wait failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed(i32),
    TimedOut,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Failed(code) => write!(f, "exit code {code}"),
            RunOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

fn outcome_from_status(status: ExitStatus) -> RunOutcome {
    if status.success() {
        RunOutcome::Completed
    } else {
        RunOutcome::Failed(status.code().unwrap_or(-1))
    }
}

/// Execute a shell command line under `workdir` with the given environment.
///
/// With a timeout, the child is polled and killed once the deadline passes.
/// Never retries.
pub fn run_shell(
    cmd_line: &str,
    workdir: &Path,
    env: &ExecEnv,
    timeout: Option<Duration>,
) -> Result<RunOutcome> {
    debug!("Running: {cmd_line} (cwd={})", workdir.display());

    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd_line).current_dir(workdir);
    for key in &env.clear {
        command.env_remove(key);
    }
    for (key, value) in &env.set {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn command: {cmd_line}"))?;

    let deadline = match timeout {
        Some(limit) => Instant::now() + limit,
        None => {
            let status = child
                .wait()
                .with_context(|| format!("Failed to wait for command: {cmd_line}"))?;
            return Ok(outcome_from_status(status));
        }
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(outcome_from_status(status));
        }
        if Instant::now() >= deadline {
            debug!("Command deadline reached, killing: {cmd_line}");
            let _ = child.kill();
            let _ = child.wait();
            return Ok(RunOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
