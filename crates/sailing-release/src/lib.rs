//! Release handle with port-forward tunnels for Smooth Sailing.
//!
//! This crate owns one installed helm release and any number of
//! `kubectl port-forward` tunnels into it:
//! - `Release` - starts tunnels and tears the release down
//! - `KubernetesContext` - namespace/kubeconfig/context selection
//! - `ToolConfig` - kubectl and helm binaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sailing_process::TokioProcessLauncher;
//! use sailing_release::{KubernetesContext, Release};
//!
//! # async fn demo() -> sailing_release::Result<()> {
//! let context = KubernetesContext::new().with_namespace("staging");
//! let release = Release::new("my-app", Arc::new(TokioProcessLauncher::new()), Some(context));
//!
//! let port = release.start_tunnel_for_service("my-app-web", 80, None).await?;
//! if port != 0 {
//!     println!("web reachable on localhost:{}", port);
//! }
//!
//! // Cancels the tunnel, waits for it, then runs `helm uninstall my-app`.
//! let report = release.tear_down().await?;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! # Teardown ordering
//!
//! Every tunnel is cancelled before any is awaited, and every tunnel is
//! awaited before the release is uninstalled. Tunnel failures during
//! shutdown are reported, never raised.

pub mod config;
pub mod context;
pub mod error;
pub mod port;
pub mod release;
pub mod tunnel;

pub use config::{ToolConfig, HELM_ENV, KUBECTL_ENV};
pub use context::{context_args, CommandParameterBuilder, KubernetesContext, Tool};
pub use error::{ReleaseError, Result};
pub use port::{extract_port, is_forwarding_line, FORWARDING_MARKER};
pub use release::{DrainFailure, Release, TeardownReport};
pub use tunnel::{TargetKind, TunnelTarget};
