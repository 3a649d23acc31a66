//! Process launcher contract and its tokio-backed implementation.

use std::pin::Pin;
use std::process::Stdio;

use futures::future::BoxFuture;
use futures::stream::{self, Stream};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, trace, warn};

use crate::cancel::CancelSignal;
use crate::error::{ProcessError, Result};

/// Lazy, line-by-line output of one process invocation.
///
/// Ends when the process exits or its cancellation signal fires. A stream
/// is bound to exactly one invocation and cannot be restarted. Dropping it
/// early kills the process.
pub type OutputLines = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Launches external commands.
pub trait ProcessLauncher: Send + Sync {
    /// Start `program` with the whitespace-separated `args` and stream its
    /// stdout lines. Nothing is spawned until the stream is first polled.
    fn execute(&self, program: &str, args: &str, signal: CancelSignal) -> OutputLines;

    /// Run `program` to completion, failing on a non-zero exit.
    fn execute_to_end<'a>(
        &'a self,
        program: &'a str,
        args: &'a str,
        signal: CancelSignal,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Split an argument string into argv, dropping empty fragments.
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(String::from).collect()
}

/// Production launcher backed by `tokio::process`.
///
/// Only stdout lines are streamed. stderr is read alongside and logged, so
/// diagnostics never masquerade as output and the pipe never fills up.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    /// Create a new launcher.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for TokioProcessLauncher {
    fn execute(&self, program: &str, args: &str, signal: CancelSignal) -> OutputLines {
        let state = LineState::Pending {
            program: program.to_string(),
            args: split_args(args),
            signal,
        };

        Box::pin(stream::unfold(state, |state| async move {
            match state {
                LineState::Pending {
                    program,
                    args,
                    signal,
                } => {
                    if signal.is_cancelled() {
                        debug!(program = %program, "cancelled before launch");
                        return None;
                    }
                    match RunningProcess::spawn(program, args, signal) {
                        Ok(running) => next_line(Box::new(running)).await,
                        Err(e) => Some((Err(e), LineState::Done)),
                    }
                }
                LineState::Running(running) => next_line(running).await,
                LineState::Done => None,
            }
        }))
    }

    fn execute_to_end<'a>(
        &'a self,
        program: &'a str,
        args: &'a str,
        signal: CancelSignal,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut signal = signal;
            let argv = split_args(args);
            debug!(program = %program, args = ?argv, "running to completion");

            let child = Command::new(program)
                .args(&argv)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| ProcessError::Spawn {
                    program: program.to_string(),
                    source,
                })?;

            // Dropping the wait future drops the child, which kills it.
            let output = tokio::select! {
                output = child.wait_with_output() => output?,
                _ = signal.cancelled() => {
                    return Err(ProcessError::Cancelled {
                        program: program.to_string(),
                    });
                }
            };

            trace!(
                program = %program,
                status = %output.status,
                stdout_len = output.stdout.len(),
                stderr_len = output.stderr.len(),
                "process completed"
            );

            if output.status.success() {
                Ok(())
            } else {
                Err(ProcessError::NonZeroExit {
                    program: program.to_string(),
                    code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        })
    }
}

enum LineState {
    Pending {
        program: String,
        args: Vec<String>,
        signal: CancelSignal,
    },
    Running(Box<RunningProcess>),
    Done,
}

async fn next_line(mut running: Box<RunningProcess>) -> Option<(Result<String>, LineState)> {
    match running.next_line().await {
        Some(Ok(line)) => Some((Ok(line), LineState::Running(running))),
        Some(Err(e)) => Some((Err(e), LineState::Done)),
        None => None,
    }
}

struct RunningProcess {
    program: String,
    child: Child,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr: Option<Lines<BufReader<ChildStderr>>>,
    signal: CancelSignal,
}

impl RunningProcess {
    fn spawn(program: String, args: Vec<String>, signal: CancelSignal) -> Result<Self> {
        debug!(program = %program, args = ?args, "launching streaming process");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let stderr = child.stderr.take().map(|s| BufReader::new(s).lines());

        Ok(Self {
            program,
            child,
            stdout,
            stderr,
            signal,
        })
    }

    /// Next stdout line, or `None` once the process has exited or been
    /// cancelled. stderr lines read meanwhile are logged.
    async fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            if self.stdout.is_none() && self.stderr.is_none() {
                return match self.child.wait().await {
                    Ok(status) => {
                        debug!(program = %self.program, status = %status, "process exited");
                        None
                    }
                    Err(e) => Some(Err(e.into())),
                };
            }

            tokio::select! {
                _ = self.signal.cancelled() => {
                    debug!(program = %self.program, "cancellation requested, killing process");
                    let _ = self.child.kill().await;
                    self.stdout = None;
                    self.stderr = None;
                    return None;
                }
                line = read_from(&mut self.stdout), if self.stdout.is_some() => match line {
                    Ok(Some(line)) => return Some(Ok(line)),
                    Ok(None) => self.stdout = None,
                    Err(e) => return Some(Err(e.into())),
                },
                line = read_from(&mut self.stderr), if self.stderr.is_some() => match line {
                    Ok(Some(line)) => {
                        warn!(program = %self.program, line = %line, "process wrote to stderr");
                    }
                    Ok(None) => self.stderr = None,
                    Err(e) => {
                        debug!(program = %self.program, error = %e, "stderr unreadable, ignoring");
                        self.stderr = None;
                    }
                },
            }
        }
    }
}

async fn read_from<R>(lines: &mut Option<Lines<R>>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}
