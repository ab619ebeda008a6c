//! Shell session control.
//!
//! Translates the supervisor's [`LifecycleEvent`] stream into view
//! transitions: splash at start, main view once the backend is ready, and a
//! session end when the backend goes away. Two timers shape the reveal: a
//! short settle delay after readiness so the backend's first render is not a
//! blank page, and a fallback that reveals the main view anyway when no
//! readiness signal arrives in reasonable time (slow machines, or a backend
//! whose log format changed).

use crate::view::{SessionEnd, ViewSink};
use halide_core::{LifecycleEvent, OutputStream};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Pause between the readiness signal and the reveal, letting the backend
/// finish its first render.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Reveal the main view after this long even without a readiness signal.
const FALLBACK_DELAY: Duration = Duration::from_secs(10);

/// Drives a [`ViewSink`] from supervisor events for one session.
pub struct ShellController<V: ViewSink> {
    view: V,
    url: String,
    settle_delay: Duration,
    fallback_delay: Duration,
}

impl<V: ViewSink> ShellController<V> {
    /// Create a controller revealing `url` in the main view.
    pub fn new(view: V, url: impl Into<String>) -> Self {
        Self {
            view,
            url: url.into(),
            settle_delay: SETTLE_DELAY,
            fallback_delay: FALLBACK_DELAY,
        }
    }

    /// Override the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Override the fallback delay.
    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Run the session to completion, consuming the event stream.
    ///
    /// Returns once the backend exits, fails, or the stream closes. The
    /// reveal happens at most once regardless of which trigger fires first.
    pub async fn run(mut self, mut events: UnboundedReceiver<LifecycleEvent>) -> SessionEnd {
        self.view.show_splash();

        let fallback = tokio::time::sleep(self.fallback_delay);
        tokio::pin!(fallback);
        // Armed (reset) when the Ready event arrives.
        let settle = tokio::time::sleep(Duration::from_secs(86_400));
        tokio::pin!(settle);
        let mut settle_armed = false;
        let mut revealed = false;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(LifecycleEvent::Started { pid }) => {
                        info!("Backend started (pid {})", pid);
                    }
                    Some(LifecycleEvent::OutputLine { stream, text }) => match stream {
                        OutputStream::Stdout => debug!(target: "backend", "{}", text),
                        OutputStream::Stderr => warn!(target: "backend", "{}", text),
                    },
                    Some(LifecycleEvent::Ready { url }) => {
                        info!("Backend ready at {}", url);
                        if !revealed && !settle_armed {
                            settle.as_mut().reset(tokio::time::Instant::now() + self.settle_delay);
                            settle_armed = true;
                        }
                    }
                    Some(LifecycleEvent::Exited { code }) => {
                        let end = SessionEnd::BackendExited { code };
                        self.view.end_session(&end);
                        return end;
                    }
                    Some(LifecycleEvent::Failed { reason }) => {
                        let end = SessionEnd::LaunchFailed { reason };
                        self.view.end_session(&end);
                        return end;
                    }
                    None => {
                        let end = SessionEnd::Disconnected;
                        self.view.end_session(&end);
                        return end;
                    }
                },
                _ = &mut settle, if settle_armed && !revealed => {
                    self.reveal();
                    revealed = true;
                }
                _ = &mut fallback, if !revealed => {
                    warn!("No readiness signal after {:?}, revealing anyway", self.fallback_delay);
                    self.reveal();
                    revealed = true;
                }
            }
        }
    }

    fn reveal(&mut self) {
        self.view.close_splash();
        self.view.show_main(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Records every transition as a string for order assertions.
    #[derive(Clone, Default)]
    struct RecordingView {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingView {
        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl ViewSink for RecordingView {
        fn show_splash(&mut self) {
            self.log.lock().unwrap().push("splash".into());
        }
        fn close_splash(&mut self) {
            self.log.lock().unwrap().push("close-splash".into());
        }
        fn show_main(&mut self, url: &str) {
            self.log.lock().unwrap().push(format!("main:{}", url));
        }
        fn end_session(&mut self, end: &SessionEnd) {
            self.log.lock().unwrap().push(format!("end:{:?}", end));
        }
    }

    fn controller(view: RecordingView) -> ShellController<RecordingView> {
        ShellController::new(view, "http://localhost:8501/")
            .with_settle_delay(Duration::from_millis(100))
            .with_fallback_delay(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_reveals_after_settle_delay() {
        let view = RecordingView::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = tokio::spawn(controller(view.clone()).run(rx));

        tx.send(LifecycleEvent::Started { pid: 1 }).unwrap();
        tx.send(LifecycleEvent::Ready {
            url: "http://localhost:8501/".into(),
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        tx.send(LifecycleEvent::Exited { code: Some(0) }).unwrap();
        let end = session.await.unwrap();

        assert_eq!(end, SessionEnd::BackendExited { code: Some(0) });
        let entries = view.entries();
        assert_eq!(entries[0], "splash");
        assert_eq!(entries[1], "close-splash");
        assert_eq!(entries[2], "main:http://localhost:8501/");
        assert!(entries[3].starts_with("end:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_reveals_without_ready() {
        let view = RecordingView::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = tokio::spawn(controller(view.clone()).run(rx));

        tx.send(LifecycleEvent::Started { pid: 1 }).unwrap();
        // No Ready ever arrives; the fallback must fire at 10s.
        tokio::time::sleep(Duration::from_secs(11)).await;

        let entries = view.entries();
        assert!(entries.contains(&"main:http://localhost:8501/".to_string()));

        drop(tx);
        let end = session.await.unwrap();
        assert_eq!(end, SessionEnd::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_happens_once() {
        let view = RecordingView::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = tokio::spawn(
            ShellController::new(view.clone(), "http://localhost:8501/")
                .with_settle_delay(Duration::from_millis(100))
                .with_fallback_delay(Duration::from_millis(150))
                .run(rx),
        );

        // Ready and the fallback land close together; only one reveal.
        tx.send(LifecycleEvent::Ready {
            url: "http://localhost:8501/".into(),
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let reveals = view
            .entries()
            .iter()
            .filter(|e| e.starts_with("main:"))
            .count();
        assert_eq!(reveals, 1);

        drop(tx);
        session.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_ends_session_without_reveal() {
        let view = RecordingView::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = tokio::spawn(controller(view.clone()).run(rx));

        tx.send(LifecycleEvent::Failed {
            reason: "no backend".into(),
        })
        .unwrap();
        let end = session.await.unwrap();

        assert_eq!(
            end,
            SessionEnd::LaunchFailed {
                reason: "no backend".into()
            }
        );
        let entries = view.entries();
        assert!(!entries.iter().any(|e| e.starts_with("main:")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_before_ready_skips_reveal() {
        let view = RecordingView::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = tokio::spawn(controller(view.clone()).run(rx));

        tx.send(LifecycleEvent::Started { pid: 1 }).unwrap();
        tx.send(LifecycleEvent::Exited { code: Some(1) }).unwrap();
        let end = session.await.unwrap();

        assert_eq!(end, SessionEnd::BackendExited { code: Some(1) });
        assert_eq!(view.entries(), vec![
            "splash".to_string(),
            format!("end:{:?}", SessionEnd::BackendExited { code: Some(1) }),
        ]);
    }
}
