//! Streaming process launcher for Smooth Sailing.
//!
//! This crate runs the external tools (kubectl, helm) that the release
//! handle drives:
//! - `ProcessLauncher` - launch contract, mockable in tests
//! - `TokioProcessLauncher` - production implementation on `tokio::process`
//! - `CancelSource` / `CancelSignal` - per-process cancellation
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use sailing_process::{CancelSource, ProcessLauncher, TokioProcessLauncher};
//!
//! # async fn demo() -> sailing_process::Result<()> {
//! let launcher = TokioProcessLauncher::new();
//! let source = CancelSource::new();
//! let mut lines = launcher.execute("kubectl", "get pods --watch", source.signal());
//!
//! if let Some(line) = lines.next().await {
//!     println!("{}", line?);
//! }
//! source.cancel();
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod error;
pub mod launcher;

pub use cancel::{CancelSignal, CancelSource};
pub use error::{ProcessError, Result};
pub use launcher::{split_args, OutputLines, ProcessLauncher, TokioProcessLauncher};
