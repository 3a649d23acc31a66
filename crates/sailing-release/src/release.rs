//! Release handle: owns a deployed release and its tunnels.

use std::fmt;
use std::sync::Arc;

use sailing_process::{CancelSignal, ProcessLauncher};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::context::{context_args, KubernetesContext, Tool};
use crate::error::Result;
use crate::tunnel::{open_tunnel, Establishment, TargetKind, TunnelRecord, TunnelTarget};

/// A tunnel whose drain task failed while the release was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainFailure {
    /// Tunnel target, e.g. `service/web:80`.
    pub tunnel: String,
    /// Rendered error.
    pub error: String,
}

/// Summary of a completed teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Number of tunnels cancelled.
    pub cancelled: usize,
    /// Tunnels that failed while shutting down. These never fail the teardown.
    pub failures: Vec<DrainFailure>,
}

impl TeardownReport {
    /// Whether every tunnel shut down cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A deployed helm release plus the port-forwards opened into it.
///
/// Tunnels live until the release is torn down. [`Release::tear_down`]
/// consumes the handle, so no tunnel can be started once teardown begins.
/// Call it exactly once on every exit path; dropping the handle instead
/// only cancels the tunnels and leaves the release installed.
pub struct Release {
    deployment_name: String,
    launcher: Arc<dyn ProcessLauncher>,
    context: Option<KubernetesContext>,
    config: ToolConfig,
    tunnels: Mutex<Vec<TunnelRecord>>,
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("deployment_name", &self.deployment_name)
            .field("context", &self.context)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Release {
    /// Binds a handle to the already installed release `deployment_name`.
    pub fn new(
        deployment_name: impl Into<String>,
        launcher: Arc<dyn ProcessLauncher>,
        context: Option<KubernetesContext>,
    ) -> Self {
        Self::with_config(deployment_name, launcher, context, ToolConfig::default())
    }

    /// Like [`Release::new`] with explicit tool binaries.
    pub fn with_config(
        deployment_name: impl Into<String>,
        launcher: Arc<dyn ProcessLauncher>,
        context: Option<KubernetesContext>,
        config: ToolConfig,
    ) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            launcher,
            context,
            config,
            tunnels: Mutex::new(Vec::new()),
        }
    }

    /// Name of the helm release.
    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    /// Context applied to every command.
    pub fn context(&self) -> Option<&KubernetesContext> {
        self.context.as_ref()
    }

    /// Number of established tunnels.
    pub async fn tunnel_count(&self) -> usize {
        self.tunnels.lock().await.len()
    }

    /// Forward a local port to `service/<name>:<target_port>`.
    ///
    /// Returns the local port, or `0` when the forwarder failed to come up.
    pub async fn start_tunnel_for_service(
        &self,
        name: &str,
        target_port: u16,
        local_port: Option<u16>,
    ) -> Result<u16> {
        self.start_tunnel(Self::target(TargetKind::Service, name, target_port, local_port))
            .await
    }

    /// Forward a local port to `pod/<name>:<target_port>`.
    ///
    /// Returns the local port, or `0` when the forwarder failed to come up.
    pub async fn start_tunnel_for_pod(
        &self,
        name: &str,
        target_port: u16,
        local_port: Option<u16>,
    ) -> Result<u16> {
        self.start_tunnel(Self::target(TargetKind::Pod, name, target_port, local_port))
            .await
    }

    fn target(kind: TargetKind, name: &str, port: u16, local_port: Option<u16>) -> TunnelTarget {
        TunnelTarget {
            kind,
            name: name.to_string(),
            port,
            local_port,
        }
    }

    /// Start a tunnel to `target`.
    ///
    /// # Errors
    ///
    /// Returns `ReleaseError::InvalidTarget` for an empty name or zero port,
    /// and `ReleaseError::MalformedForwardingLine` when kubectl announced the
    /// tunnel in an unrecognised format. A forwarder that simply fails to
    /// start is not an error and yields `Ok(0)`.
    pub async fn start_tunnel(&self, target: TunnelTarget) -> Result<u16> {
        target.validate()?;
        let context = context_args(self.context.as_ref(), Tool::Kubectl);

        match open_tunnel(self.launcher.as_ref(), &self.config.kubectl, &target, &context).await? {
            Establishment::Established { port, record } => {
                self.tunnels.lock().await.push(record);
                Ok(port)
            }
            Establishment::Failed => Ok(0),
        }
    }

    /// `helm uninstall` argument string for this release.
    pub fn uninstall_args(&self) -> String {
        format!(
            "uninstall {} {}",
            self.deployment_name,
            context_args(self.context.as_ref(), Tool::Helm)
        )
    }

    /// Cancel every tunnel, wait for all of them, then uninstall the release.
    ///
    /// Tunnel shutdown failures are logged and returned in the report; only
    /// a failing uninstall fails the teardown.
    pub async fn tear_down(mut self) -> Result<TeardownReport> {
        let tunnels = std::mem::take(self.tunnels.get_mut());
        let cancelled = tunnels.len();

        info!(
            release = %self.deployment_name,
            tunnels = cancelled,
            "tearing down release"
        );

        for tunnel in &tunnels {
            tunnel.cancel.cancel();
        }

        let outcomes = futures::future::join_all(
            tunnels
                .into_iter()
                .map(|tunnel| async move { (tunnel.label, tunnel.task.await) }),
        )
        .await;

        let mut failures = Vec::new();
        for (tunnel, outcome) in outcomes {
            let error = match outcome {
                Ok(Ok(())) => {
                    debug!(tunnel = %tunnel, "tunnel closed");
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("drain task aborted: {}", e),
            };
            warn!(
                release = %self.deployment_name,
                tunnel = %tunnel,
                error = %error,
                "tunnel failed during shutdown"
            );
            failures.push(DrainFailure { tunnel, error });
        }

        let args = self.uninstall_args();
        self.launcher
            .execute_to_end(&self.config.helm, &args, CancelSignal::never())
            .await?;

        info!(
            release = %self.deployment_name,
            failed_tunnels = failures.len(),
            "release uninstalled"
        );

        Ok(TeardownReport {
            cancelled,
            failures,
        })
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        let tunnels = self.tunnels.get_mut();
        if tunnels.is_empty() {
            return;
        }

        warn!(
            release = %self.deployment_name,
            tunnels = tunnels.len(),
            "release dropped without teardown, cancelling tunnels"
        );
        for tunnel in tunnels.iter() {
            tunnel.cancel.cancel();
        }
    }
}
