//! Halide Core - backend process supervision for the Halide desktop shell.
//!
//! This crate owns the lifecycle of the local application server the shell
//! embeds: launching it as a process group, watching its output, probing its
//! HTTP port for readiness, and guaranteeing the whole process tree is gone
//! when the shell exits. The shell's windowing layer never touches a process
//! handle; it issues `start()`/`stop()` and consumes [`LifecycleEvent`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use halide_core::{Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> halide_core::Result<()> {
//!     let config = SupervisorConfig::new("/opt/halide/backend", 8501)
//!         .with_ready_marker("URL: http://localhost:8501");
//!     let (supervisor, mut events) = Supervisor::new(config);
//!
//!     supervisor.start().await?;
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod platform;
pub mod process;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{ReadinessTarget, SupervisorConfig, SupervisorTiming};
pub use error::{HalideError, Result};
pub use event::{LifecycleEvent, OutputStream};
pub use process::{
    PortReclaimer, ProbeOutcome, ProcessLauncher, ReadinessProber, SupervisedProcess, Supervisor,
    SupervisorState,
};
