//! Scripted in-memory process launcher that records an ordered trace.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream;
use sailing_process::{CancelSignal, OutputLines, ProcessError, ProcessLauncher};

/// What a scripted forwarder does after printing its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterOutput {
    /// Exit on its own.
    Exit,
    /// Stay up until cancelled, then end cleanly.
    HoldUntilCancelled,
    /// Stay up until cancelled, then yield a read error.
    FailOnCancel,
    /// Stay up until cancelled, then panic.
    PanicOnCancel,
}

/// One scripted `execute` invocation.
#[derive(Debug, Clone)]
pub struct Script {
    pub lines: Vec<String>,
    pub after: AfterOutput,
}

impl Script {
    pub fn forwarding(port: u16, target: u16) -> Self {
        Self {
            lines: vec![
                format!("Forwarding from 127.0.0.1:{} -> {}", port, target),
                format!("Forwarding from [::1]:{} -> {}", port, target),
            ],
            after: AfterOutput::HoldUntilCancelled,
        }
    }

    pub fn failing(line: &str) -> Self {
        Self {
            lines: vec![line.to_string(), "exit status 1".to_string()],
            after: AfterOutput::Exit,
        }
    }

    pub fn silent() -> Self {
        Self {
            lines: Vec::new(),
            after: AfterOutput::Exit,
        }
    }

    pub fn then(mut self, after: AfterOutput) -> Self {
        self.after = after;
        self
    }
}

/// Observable events, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launched { program: String, args: String },
    Cancelled { args: String },
    StreamEnded { args: String },
    RanToEnd { program: String, args: String },
}

#[derive(Default)]
pub struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Script>>,
    trace: Arc<Mutex<Vec<Event>>>,
    signals: Arc<Mutex<Vec<CancelSignal>>>,
    uninstall_failure: Mutex<Option<String>>,
}

impl ScriptedLauncher {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }

    pub fn fail_uninstall(&self, stderr: &str) {
        *self.uninstall_failure.lock().unwrap() = Some(stderr.to_string());
    }

    pub fn trace(&self) -> Vec<Event> {
        self.trace.lock().unwrap().clone()
    }

    pub fn launches(&self) -> Vec<String> {
        self.trace()
            .into_iter()
            .filter_map(|e| match e {
                Event::Launched { args, .. } => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.trace().iter().position(predicate)
    }
}

struct ScriptState {
    lines: VecDeque<String>,
    after: AfterOutput,
    signal: CancelSignal,
    args: String,
    trace: Arc<Mutex<Vec<Event>>>,
    signals: Arc<Mutex<Vec<CancelSignal>>>,
    finished: bool,
}

impl ScriptState {
    fn record(&self, event: Event) {
        self.trace.lock().unwrap().push(event);
    }

    /// Wait until every forwarder launched so far has been cancelled (or
    /// its owner dropped). A teardown that awaits a tunnel before cancelling
    /// the others never gets past this.
    async fn wait_for_all_cancelled(&self) {
        let signals = self.signals.lock().unwrap().clone();
        for mut signal in signals {
            signal.cancelled().await;
        }
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn execute(&self, program: &str, args: &str, signal: CancelSignal) -> OutputLines {
        self.trace.lock().unwrap().push(Event::Launched {
            program: program.to_string(),
            args: args.to_string(),
        });

        self.signals.lock().unwrap().push(signal.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Script::silent);

        let state = ScriptState {
            lines: script.lines.into(),
            after: script.after,
            signal,
            args: args.to_string(),
            trace: Arc::clone(&self.trace),
            signals: Arc::clone(&self.signals),
            finished: false,
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            if let Some(line) = state.lines.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }
            if state.after != AfterOutput::Exit {
                state.signal.cancelled().await;
                state.record(Event::Cancelled {
                    args: state.args.clone(),
                });
                state.wait_for_all_cancelled().await;
            }
            state.record(Event::StreamEnded {
                args: state.args.clone(),
            });
            match state.after {
                AfterOutput::FailOnCancel => {
                    state.finished = true;
                    let err = ProcessError::Io(std::io::Error::other("connection reset"));
                    Some((Err(err), state))
                }
                AfterOutput::PanicOnCancel => panic!("forwarder crashed"),
                _ => None,
            }
        }))
    }

    fn execute_to_end<'a>(
        &'a self,
        program: &'a str,
        args: &'a str,
        _signal: CancelSignal,
    ) -> BoxFuture<'a, sailing_process::Result<()>> {
        Box::pin(async move {
            self.trace.lock().unwrap().push(Event::RanToEnd {
                program: program.to_string(),
                args: args.to_string(),
            });
            match self.uninstall_failure.lock().unwrap().clone() {
                Some(stderr) => Err(ProcessError::NonZeroExit {
                    program: program.to_string(),
                    code: Some(1),
                    stderr,
                }),
                None => Ok(()),
            }
        })
    }
}
