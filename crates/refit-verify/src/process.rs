//! Child-process execution with a timeout and forced termination.
//!
//! The child runs in its own process group so the whole tree can be
//! signalled. Its stdout and stderr are drained by one reader task into a
//! shared buffer while the caller waits on the exit status. When the
//! timeout passes the state machine escalates `Running -> Terminating`
//! (SIGTERM) and, after the grace window, `Terminating -> Killed`
//! (SIGKILL).

use crate::error::VerifyError;
use refit_common::config::BuildSettings;
use serde::Serialize;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Marker prefix appended to the output of a timed-out process.
pub const TIMEOUT_MARKER: &str = "[refit] timed out after";

const READER_DRAIN_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Terminating,
    Killed,
    Completed,
}

impl ProcessState {
    /// State after the current state's deadline passes.
    pub fn escalate(self) -> Self {
        match self {
            Self::Running => Self::Terminating,
            Self::Terminating => Self::Killed,
            other => other,
        }
    }

    /// State once the child has exited.
    pub fn exited(self) -> Self {
        match self {
            Self::Running => Self::Completed,
            other => other,
        }
    }

    /// How the process ended, given the state it exited in.
    pub fn termination_path(self) -> TerminationPath {
        match self {
            Self::Running | Self::Completed => TerminationPath::Completed,
            Self::Terminating => TerminationPath::Terminated,
            Self::Killed => TerminationPath::Killed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPath {
    Completed,
    Terminated,
    Killed,
}

/// How long each state may last before escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub timeout: Duration,
    pub grace: Duration,
}

impl TerminationPolicy {
    pub fn new(timeout: Duration, grace: Duration) -> Self {
        Self { timeout, grace }
    }

    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self::new(settings.timeout(), settings.grace())
    }

    /// Time allowed in `state`; `None` means wait for exit unconditionally.
    pub fn limit_for(&self, state: ProcessState) -> Option<Duration> {
        match state {
            ProcessState::Running => Some(self.timeout),
            ProcessState::Terminating => Some(self.grace),
            ProcessState::Killed | ProcessState::Completed => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    /// `-1` when the process timed out or died from a signal.
    pub exit_code: i32,
    /// stdout and stderr, interleaved in arrival order.
    pub output: String,
    pub elapsed: Duration,
    pub timed_out: bool,
    pub termination: TerminationPath,
}

/// Runs one command at a time under a [`TerminationPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    policy: TerminationPolicy,
}

impl ProcessRunner {
    pub fn new(policy: TerminationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TerminationPolicy {
        self.policy
    }

    pub async fn run(&self, argv: &[String], cwd: &Path) -> Result<ProcessOutcome, VerifyError> {
        let (program, args) = argv.split_first().ok_or_else(|| VerifyError::ParseError {
            tool: "command".into(),
            message: "empty command line".into(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VerifyError::ToolNotFound {
                    tool: program.clone(),
                }
            } else {
                VerifyError::ToolExecution {
                    tool: program.clone(),
                    source: e,
                }
            }
        })?;
        tracing::info!("Spawned {} (pid {:?}) in {}", argv.join(" "), child.id(), cwd.display());

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut reader = tokio::spawn(drain(
            child.stdout.take(),
            child.stderr.take(),
            Arc::clone(&buffer),
        ));

        let (status, state) = self.wait(&mut child, program).await?;

        if tokio::time::timeout(READER_DRAIN_WAIT, &mut reader).await.is_err() {
            tracing::warn!("Output of {} still open after exit; truncating", program);
            reader.abort();
        }
        let elapsed = started.elapsed();

        let mut output = buffer
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        let timed_out = state != ProcessState::Completed;
        if timed_out {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&format!(
                "{TIMEOUT_MARKER} {}s\n",
                self.policy.timeout.as_secs()
            ));
        }

        let exit_code = if timed_out {
            -1
        } else {
            status.code().unwrap_or(-1)
        };
        let outcome = ProcessOutcome {
            success: !timed_out && status.success(),
            exit_code,
            output,
            elapsed,
            timed_out,
            termination: state.termination_path(),
        };
        tracing::debug!(
            "{} finished: exit {} after {:?} ({:?})",
            program,
            outcome.exit_code,
            outcome.elapsed,
            outcome.termination
        );
        Ok(outcome)
    }

    async fn wait(
        &self,
        child: &mut Child,
        program: &str,
    ) -> Result<(ExitStatus, ProcessState), VerifyError> {
        let exec_error = |e| VerifyError::ToolExecution {
            tool: program.to_string(),
            source: e,
        };
        let mut state = ProcessState::Running;
        loop {
            let Some(limit) = self.policy.limit_for(state) else {
                let status = child.wait().await.map_err(exec_error)?;
                return Ok((status, state.exited()));
            };
            match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => return Ok((status.map_err(exec_error)?, state.exited())),
                Err(_) => {
                    state = state.escalate();
                    match state {
                        ProcessState::Terminating => tracing::warn!(
                            "{} exceeded {:?}; sending SIGTERM",
                            program,
                            self.policy.timeout
                        ),
                        _ => tracing::warn!(
                            "{} ignored SIGTERM for {:?}; sending SIGKILL",
                            program,
                            self.policy.grace
                        ),
                    }
                    signal(child, state);
                }
            }
        }
    }
}

async fn drain<O, E>(stdout: Option<O>, stderr: Option<E>, buffer: Arc<Mutex<Vec<u8>>>)
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    tokio::join!(pump(stdout, &buffer), pump(stderr, &buffer));
}

async fn pump<R: AsyncRead + Unpin>(reader: Option<R>, buffer: &Mutex<Vec<u8>>) {
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut shared) = buffer.lock() {
                    shared.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }
}

#[cfg(unix)]
fn signal(child: &mut Child, state: ProcessState) {
    let sig = match state {
        ProcessState::Terminating => libc::SIGTERM,
        ProcessState::Killed => libc::SIGKILL,
        _ => return,
    };
    let Some(pid) = child.id() else {
        return;
    };
    // negative pid addresses the whole process group
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), sig) };
    if rc != 0 {
        tracing::debug!("Group signal to {} failed; signalling the child only", pid);
        if sig == libc::SIGKILL {
            let _ = child.start_kill();
        } else {
            let _ = unsafe { libc::kill(pid as libc::pid_t, sig) };
        }
    }
}

#[cfg(not(unix))]
fn signal(child: &mut Child, state: ProcessState) {
    if matches!(state, ProcessState::Terminating | ProcessState::Killed) {
        let _ = child.start_kill();
    }
}
