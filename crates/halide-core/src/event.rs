//! Lifecycle events emitted by the supervisor.
//!
//! Events are transient and delivered in the order they are detected. The
//! supervisor guarantees no `Ready` is ever delivered after `Exited` for the
//! same backend instance.

use serde::Serialize;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Event produced by the supervisor, consumed by the shell's lifecycle
/// controller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LifecycleEvent {
    /// The backend process spawned.
    Started { pid: u32 },
    /// A line of backend output.
    OutputLine { stream: OutputStream, text: String },
    /// The backend is answering requests at `url`.
    Ready { url: String },
    /// The backend is gone. `code` is `None` when it was killed by a signal.
    Exited { code: Option<i32> },
    /// The backend could not be launched.
    Failed { reason: String },
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::Started { pid } => write!(f, "started (pid {})", pid),
            LifecycleEvent::OutputLine { stream, text } => write!(f, "[{}] {}", stream, text),
            LifecycleEvent::Ready { url } => write!(f, "ready at {}", url),
            LifecycleEvent::Exited { code: Some(code) } => write!(f, "exited with code {}", code),
            LifecycleEvent::Exited { code: None } => write!(f, "exited (killed)"),
            LifecycleEvent::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
