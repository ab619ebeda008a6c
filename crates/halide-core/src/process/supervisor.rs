//! Backend lifecycle supervision.
//!
//! One [`Supervisor`] owns one backend instance for the whole session:
//! launch, readiness detection, exit detection, and guaranteed teardown.
//! Readiness has two independent signals (a known marker line on stdout
//! and the HTTP prober) and the first one to fire wins; a verbose backend
//! is detected fast, a silent one is still detected. The supervisor is
//! single-shot by design: no launch retries, no respawn on crash. Restart
//! policy belongs to the caller.
//!
//! Every state transition happens under one lock, and events are sent
//! while that lock is held, so consumers observe events in detection order
//! and never see `Ready` after `Exited`.

use crate::cancel::CancellationToken;
use crate::config::SupervisorConfig;
use crate::error::{HalideError, Result};
use crate::event::{LifecycleEvent, OutputStream};
use crate::platform;
use crate::process::launcher::{ProcessLauncher, SupervisedProcess};
use crate::process::probe::{ProbeOutcome, ReadinessProber};
use crate::process::reclaim::PortReclaimer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle state of the supervised backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No backend yet; `start()` has not been called.
    Idle,
    /// Spawning the backend process.
    Launching,
    /// Process is up; waiting for a readiness signal. Staying here past the
    /// readiness deadline is not a failure.
    Probing,
    /// The backend answered; the shell can show the main view.
    Ready,
    /// A `stop()` is in flight.
    Terminating,
    /// The backend is gone, either by itself or through `stop()`.
    Terminated,
    /// The backend never started.
    Failed,
}

impl SupervisorState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Terminated | SupervisorState::Failed)
    }
}

/// Supervises one backend server process for the lifetime of a shell
/// session.
///
/// Cloning is cheap; clones share the same supervised instance.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: SupervisorConfig,
    /// The single transition guard. Events are emitted under this lock.
    state: Mutex<StateCell>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    /// Cancels the readiness prober the instant a `stop()` begins.
    cancel: CancellationToken,
    /// Collapses concurrent `stop()` calls into one termination.
    stop_gate: tokio::sync::Mutex<()>,
}

struct StateCell {
    state: SupervisorState,
    pid: Option<u32>,
}

impl Supervisor {
    /// Create a supervisor and the event stream its consumer reads.
    pub fn new(config: SupervisorConfig) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(StateCell {
                    state: SupervisorState::Idle,
                    pid: None,
                }),
                events: tx,
                cancel: CancellationToken::new(),
                stop_gate: tokio::sync::Mutex::new(()),
            }),
        };
        (supervisor, rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        self.inner.state.lock().unwrap().state
    }

    /// Whether a backend process is currently up.
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            SupervisorState::Probing | SupervisorState::Ready
        )
    }

    /// PID of the supervised process, if one is active.
    pub fn pid(&self) -> Option<u32> {
        self.inner.state.lock().unwrap().pid
    }

    /// Launch the backend and begin readiness detection.
    ///
    /// Fails with [`HalideError::AlreadyRunning`] unless the supervisor is
    /// `Idle`; the supervisor is single-shot per session. Launch failure
    /// moves to `Failed` and emits a `Failed` event. Returns the backend
    /// PID on success.
    pub async fn start(&self) -> Result<u32> {
        self.inner.begin_launch()?;

        // Best-effort, uncoordinated; the launch never waits on it.
        PortReclaimer::spawn(self.inner.config.target.port);

        let process = match ProcessLauncher::launch(&self.inner.config) {
            Ok(p) => p,
            Err(e) => {
                self.inner.fail(e.to_string());
                return Err(e);
            }
        };

        let pid = process.pid;
        if !self.inner.mark_started(pid) {
            // stop() raced the spawn; the fresh process must not be leaked.
            warn!("Supervisor stopped during launch, killing pid {}", pid);
            platform::terminate_group(pid, self.inner.config.term_grace, self.inner.config.kill_confirm)
                .await;
            return Err(HalideError::Launch {
                message: "Supervisor was stopped during launch".to_string(),
                source: None,
            });
        }

        self.spawn_monitors(process);
        Ok(pid)
    }

    /// Tear down the backend's whole process group.
    ///
    /// Safe to call from any state; a no-op once terminal. Concurrent
    /// callers collapse into the single in-progress termination and all
    /// observe the same outcome. Escalates graceful → forceful → by-name,
    /// each step bounded, so shutdown latency is bounded even under a
    /// misbehaving child.
    pub async fn stop(&self) -> Result<()> {
        let _gate = self.inner.stop_gate.lock().await;

        let pid = match self.inner.begin_termination() {
            Some(pid) => pid,
            None => return Ok(()),
        };

        self.inner.cancel.cancel();

        let Some(pid) = pid else {
            // Never launched; nothing to kill.
            self.inner.finish_termination();
            return Ok(());
        };

        info!("Stopping backend process group {}", pid);
        let outcome = platform::terminate_group(
            pid,
            self.inner.config.term_grace,
            self.inner.config.kill_confirm,
        )
        .await;

        if !outcome.confirmed() {
            if let Some(ref name) = self.inner.config.executable_name {
                warn!(
                    "Group termination for {} unconfirmed, killing by name: {}",
                    pid, name
                );
                let killed = platform::kill_processes_by_name(name).await;
                debug!("By-name kill signalled {} process(es)", killed);
            } else {
                warn!("Group termination for {} unconfirmed and no executable name configured", pid);
            }
        }

        self.inner.finish_termination();
        Ok(())
    }

    /// Spawn the per-process background tasks: output drains, the
    /// readiness prober, and the exit monitor.
    fn spawn_monitors(&self, mut process: SupervisedProcess) {
        let url = self.inner.config.target.url();

        if let Some(stdout) = process.stdout.take() {
            let inner = self.inner.clone();
            let ready_url = url.clone();
            tokio::spawn(async move {
                inner.drain_stream(stdout, OutputStream::Stdout, Some(&ready_url)).await;
            });
        }

        if let Some(stderr) = process.stderr.take() {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                inner.drain_stream(stderr, OutputStream::Stderr, None).await;
            });
        }

        {
            let inner = self.inner.clone();
            let probe_url = url;
            tokio::spawn(async move {
                inner.run_prober(&probe_url).await;
            });
        }

        {
            let inner = self.inner.clone();
            let mut child = process.child;
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => {
                        info!("Backend process exited with {}", status);
                        inner.mark_exited(status.code());
                    }
                    Err(e) => {
                        warn!("Failed to wait on backend process: {}", e);
                        inner.mark_exited(None);
                    }
                }
            });
        }
    }
}

impl Inner {
    /// Send an event; a dropped consumer is not an error.
    fn emit(&self, event: LifecycleEvent) {
        let _ = self.events.send(event);
    }

    /// `Idle → Launching`, or `AlreadyRunning`.
    fn begin_launch(&self) -> Result<()> {
        let mut cell = self.state.lock().unwrap();
        if cell.state != SupervisorState::Idle {
            return Err(HalideError::AlreadyRunning {
                pid: cell.pid.unwrap_or(0),
            });
        }
        cell.state = SupervisorState::Launching;
        Ok(())
    }

    /// `Launching → Probing`, emitting `Started`. Returns false when a
    /// concurrent `stop()` already moved the machine on.
    fn mark_started(&self, pid: u32) -> bool {
        let mut cell = self.state.lock().unwrap();
        if cell.state != SupervisorState::Launching {
            return false;
        }
        cell.state = SupervisorState::Probing;
        cell.pid = Some(pid);
        self.emit(LifecycleEvent::Started { pid });
        true
    }

    /// `Probing → Ready`, emitting `Ready`. First signal wins; a readiness
    /// signal arriving in any other state (including after exit) is
    /// discarded.
    fn mark_ready(&self, url: &str) -> bool {
        let mut cell = self.state.lock().unwrap();
        if cell.state != SupervisorState::Probing {
            return false;
        }
        cell.state = SupervisorState::Ready;
        self.emit(LifecycleEvent::Ready {
            url: url.to_string(),
        });
        true
    }

    /// Any non-terminal state → `Terminated`, emitting `Exited`. The exit
    /// monitor is the single emitter of `Exited`, for self-exits and
    /// stop-induced kills alike.
    fn mark_exited(&self, code: Option<i32>) {
        let mut cell = self.state.lock().unwrap();
        if cell.state.is_terminal() {
            return;
        }
        cell.state = SupervisorState::Terminated;
        cell.pid = None;
        self.emit(LifecycleEvent::Exited { code });
    }

    /// Move to `Failed` and emit the reason, unless already terminal.
    fn fail(&self, reason: String) {
        let mut cell = self.state.lock().unwrap();
        if cell.state.is_terminal() {
            return;
        }
        cell.state = SupervisorState::Failed;
        cell.pid = None;
        self.emit(LifecycleEvent::Failed { reason });
    }

    /// Enter `Terminating`. Returns `None` when there is nothing to do
    /// (never started or already terminal), otherwise the pid to kill
    /// (which may itself be `None` if the launch never produced one).
    #[allow(clippy::option_option)]
    fn begin_termination(&self) -> Option<Option<u32>> {
        let mut cell = self.state.lock().unwrap();
        match cell.state {
            SupervisorState::Idle | SupervisorState::Terminated | SupervisorState::Failed => None,
            _ => {
                cell.state = SupervisorState::Terminating;
                Some(cell.pid)
            }
        }
    }

    /// `Terminating → Terminated`. A no-op when the exit monitor already
    /// confirmed the death and emitted `Exited`.
    fn finish_termination(&self) {
        let mut cell = self.state.lock().unwrap();
        if cell.state == SupervisorState::Terminating {
            cell.state = SupervisorState::Terminated;
            cell.pid = None;
        }
    }

    /// Forward a child output stream line by line, scanning stdout for the
    /// configured ready marker.
    async fn drain_stream<R>(&self, stream: R, kind: OutputStream, ready_url: Option<&str>)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    self.emit(LifecycleEvent::OutputLine {
                        stream: kind,
                        text: line.clone(),
                    });
                    if let (Some(url), Some(marker)) = (ready_url, self.config.ready_marker.as_ref())
                    {
                        if line.contains(marker.as_str()) && self.mark_ready(url) {
                            debug!("Readiness detected via output marker");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Output stream {} closed with error: {}", kind, e);
                    break;
                }
            }
        }
    }

    /// Run the HTTP readiness prober until it fires, times out, or is
    /// cancelled. A timeout deliberately leaves the state untouched; the
    /// shell applies its own fallback policy instead of the supervisor
    /// failing the session on slow hardware.
    async fn run_prober(&self, url: &str) {
        let prober = match ReadinessProber::new(self.config.probe_interval) {
            Ok(p) => p,
            Err(e) => {
                warn!("Readiness prober unavailable: {}", e);
                return;
            }
        };

        match prober
            .probe_until_ready(url, self.config.ready_timeout, &self.cancel)
            .await
        {
            ProbeOutcome::Ready => {
                if self.mark_ready(url) {
                    debug!("Readiness detected via HTTP probe");
                }
            }
            ProbeOutcome::TimedOut => {
                warn!(
                    "Backend not ready within {:?}; leaving session up",
                    self.config.ready_timeout
                );
            }
            ProbeOutcome::Cancelled => {
                debug!("Readiness probing cancelled by shutdown");
            }
        }
    }
}
