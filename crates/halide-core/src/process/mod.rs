//! Backend process supervision.
//!
//! Leaf-first: [`PortReclaimer`] frees the backend port before launch,
//! [`ProcessLauncher`] spawns the backend as a process group,
//! [`ReadinessProber`] polls its HTTP port, and [`Supervisor`] coordinates
//! the whole lifecycle and emits [`crate::LifecycleEvent`]s.

mod launcher;
mod probe;
mod reclaim;
mod supervisor;

pub use launcher::{ProcessLauncher, SupervisedProcess};
pub use probe::{ProbeOutcome, ReadinessProber};
pub use reclaim::PortReclaimer;
pub use supervisor::{Supervisor, SupervisorState};
