//! Port-forward tunnels: launching, establishment detection and draining.

use std::fmt;

use futures::StreamExt;
use sailing_process::{CancelSource, OutputLines, ProcessLauncher};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{ReleaseError, Result};
use crate::port::{extract_port, is_forwarding_line};

/// Kind of Kubernetes object a tunnel points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A `service/<name>` target.
    Service,
    /// A `pod/<name>` target.
    Pod,
}

impl TargetKind {
    /// Resource prefix understood by `kubectl port-forward`.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Service => "service",
            TargetKind::Pod => "pod",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tunnel forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    /// Object kind.
    pub kind: TargetKind,
    /// Object name.
    pub name: String,
    /// Port on the object.
    pub port: u16,
    /// Requested local port, `None` lets kubectl pick one.
    pub local_port: Option<u16>,
}

impl TunnelTarget {
    /// Creates a target with a kubectl-assigned local port.
    pub fn new(kind: TargetKind, name: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            name: name.into(),
            port,
            local_port: None,
        }
    }

    /// Requests a specific local port.
    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = Some(local_port);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReleaseError::InvalidTarget(format!(
                "{} name must not be empty",
                self.kind
            )));
        }
        if self.port == 0 {
            return Err(ReleaseError::InvalidTarget(format!(
                "{}/{}: target port must be positive",
                self.kind, self.name
            )));
        }
        if self.local_port == Some(0) {
            return Err(ReleaseError::InvalidTarget(format!(
                "{}/{}: local port must be positive or omitted",
                self.kind, self.name
            )));
        }
        Ok(())
    }

    /// `kubectl port-forward` argument string for this target.
    pub fn forward_args(&self, context_args: &str) -> String {
        let local = self.local_port.map(|p| p.to_string()).unwrap_or_default();
        format!(
            "port-forward {}/{} {}:{} {}",
            self.kind, self.name, local, self.port, context_args
        )
    }
}

impl fmt::Display for TunnelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.kind, self.name, self.port)
    }
}

/// A live tunnel owned by a release.
pub(crate) struct TunnelRecord {
    /// Human-readable target, used in reports.
    pub(crate) label: String,
    /// Task draining the forwarder's output until it ends.
    pub(crate) task: JoinHandle<sailing_process::Result<()>>,
    /// Cancels the forwarder process.
    pub(crate) cancel: CancelSource,
}

/// Outcome of a tunnel start.
pub(crate) enum Establishment {
    /// First line announced the tunnel.
    Established { port: u16, record: TunnelRecord },
    /// The forwarder failed to come up; its output has been fully consumed.
    Failed,
}

/// Launch a forwarder for `target` and classify its first output line.
pub(crate) async fn open_tunnel(
    launcher: &dyn ProcessLauncher,
    kubectl: &str,
    target: &TunnelTarget,
    context_args: &str,
) -> Result<Establishment> {
    let cancel = CancelSource::new();
    let args = target.forward_args(context_args);
    let label = target.to_string();

    debug!(tunnel = %label, args = %args, "starting port-forward");
    let mut lines = launcher.execute(kubectl, &args, cancel.signal());

    let first = match lines.next().await {
        Some(Ok(line)) => line,
        Some(Err(e)) => {
            warn!(tunnel = %label, error = %e, "port-forward failed before producing output");
            drain_quietly(&label, lines).await;
            return Ok(Establishment::Failed);
        }
        None => {
            warn!(tunnel = %label, "port-forward exited without output");
            return Ok(Establishment::Failed);
        }
    };

    if !is_forwarding_line(&first) {
        warn!(tunnel = %label, line = %first, "port-forward did not establish");
        drain_quietly(&label, lines).await;
        return Ok(Establishment::Failed);
    }

    let port = match extract_port(&first) {
        Ok(port) => port,
        Err(e) => {
            // Dropping the stream kills the forwarder.
            cancel.cancel();
            return Err(e);
        }
    };

    info!(tunnel = %label, local_port = port, "port-forward established");

    let task_label = label.clone();
    let task = tokio::spawn(async move {
        let discarded = drain_to_end(lines).await?;
        debug!(tunnel = %task_label, discarded, "port-forward output ended");
        Ok::<(), sailing_process::ProcessError>(())
    });

    Ok(Establishment::Established {
        port,
        record: TunnelRecord {
            label,
            task,
            cancel,
        },
    })
}

/// Consume `lines` until the stream ends, returning how many were discarded.
pub(crate) async fn drain_to_end(mut lines: OutputLines) -> sailing_process::Result<usize> {
    let mut discarded = 0;
    while let Some(line) = lines.next().await {
        let line = line?;
        trace!(line = %line, "discarding forwarder output");
        discarded += 1;
    }
    Ok(discarded)
}

async fn drain_quietly(label: &str, lines: OutputLines) {
    if let Err(e) = drain_to_end(lines).await {
        debug!(tunnel = %label, error = %e, "error while draining failed port-forward");
    }
}
