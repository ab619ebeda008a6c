//! The seam between lifecycle control and the windowing layer.
//!
//! The controller never talks to a window directly; it drives a [`ViewSink`].
//! The real desktop build implements this over its webview windows, and
//! tests implement it over a recording stub.

/// Why the shell session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The backend process exited. `code` is `None` when it was killed by a
    /// signal.
    BackendExited { code: Option<i32> },
    /// The backend could not be launched at all.
    LaunchFailed { reason: String },
    /// The supervisor's event stream closed without a terminal event.
    Disconnected,
}

/// Receives view transitions from the [`ShellController`].
///
/// Calls arrive in a fixed order: `show_splash` first, then at most one
/// reveal (`close_splash` followed by `show_main`), then `end_session`.
///
/// [`ShellController`]: crate::controller::ShellController
pub trait ViewSink {
    /// The session is starting; show the splash screen.
    fn show_splash(&mut self);

    /// Hide the splash screen.
    fn close_splash(&mut self);

    /// Present the main view pointed at the backend URL.
    fn show_main(&mut self, url: &str);

    /// The session is over; tear the windows down.
    fn end_session(&mut self, end: &SessionEnd);
}

/// A [`ViewSink`] that narrates transitions to the log and prints the
/// backend URL. Used when the shell runs without an embedded window, and as
/// the default sink for the CLI binary.
pub struct ConsoleView;

impl ViewSink for ConsoleView {
    fn show_splash(&mut self) {
        tracing::info!("Session starting");
    }

    fn close_splash(&mut self) {}

    fn show_main(&mut self, url: &str) {
        tracing::info!("Backend available at {}", url);
        println!("{}", url);
    }

    fn end_session(&mut self, end: &SessionEnd) {
        match end {
            SessionEnd::BackendExited { code: Some(code) } => {
                tracing::info!("Backend exited with code {}", code)
            }
            SessionEnd::BackendExited { code: None } => tracing::info!("Backend was killed"),
            SessionEnd::LaunchFailed { reason } => tracing::error!("Launch failed: {}", reason),
            SessionEnd::Disconnected => tracing::warn!("Supervisor event stream closed"),
        }
    }
}
