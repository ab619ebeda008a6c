//! HTTP readiness probing.
//!
//! The backend's log text is unstructured and changes across versions, so
//! the authoritative readiness signal is a plain GET against the expected
//! local URL: any 2xx answer means the server is usable.

use crate::cancel::CancellationToken;
use crate::error::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-request timeout; probes are cheap and local.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a probing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend answered 2xx.
    Ready,
    /// The overall deadline elapsed. Not an error; the caller decides
    /// whether to proceed anyway.
    TimedOut,
    /// Probing was cancelled by a shutdown.
    Cancelled,
}

/// Polls a local URL until the backend answers.
pub struct ReadinessProber {
    client: reqwest::Client,
    interval: Duration,
}

impl ReadinessProber {
    /// Create a prober issuing one request per `interval`.
    pub fn new(interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, interval })
    }

    /// Probe `url` until it answers 2xx, the deadline elapses, or the token
    /// is cancelled. Connection refusal and per-request timeouts mean "not
    /// yet" and are retried.
    pub async fn probe_until_ready(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome {
        let start = Instant::now();
        debug!("Probing {} for readiness", url);

        loop {
            if cancel.is_cancelled() {
                return ProbeOutcome::Cancelled;
            }

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Backend ready at {} after {:?}", url, start.elapsed());
                    return ProbeOutcome::Ready;
                }
                Ok(response) => {
                    debug!("Backend answered {}, still starting", response.status());
                }
                Err(e) => {
                    debug!("Probe attempt failed: {}", e);
                }
            }

            if start.elapsed() >= timeout {
                return ProbeOutcome::TimedOut;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
