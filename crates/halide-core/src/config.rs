//! Supervisor configuration.
//!
//! A [`SupervisorConfig`] describes one backend instance: how to launch it,
//! where it is expected to become reachable, and the time budgets for
//! readiness probing and teardown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the per-user data directory into the
/// backend. This is the only configuration channel the backend receives.
pub const USER_DIR_ENV: &str = "HALIDE_USER_DIR";

/// Default time budgets for supervision.
pub struct SupervisorTiming;

impl SupervisorTiming {
    /// Interval between readiness probes.
    pub const PROBE_INTERVAL: Duration = Duration::from_millis(500);
    /// Overall readiness deadline. Elapsing is not a failure; the shell
    /// applies its own fallback policy.
    pub const READY_TIMEOUT: Duration = Duration::from_secs(90);
    /// Grace period after the group-wide termination request.
    pub const TERM_GRACE: Duration = Duration::from_secs(2);
    /// Wait after the forceful kill before the group is declared gone.
    pub const KILL_CONFIRM: Duration = Duration::from_secs(1);
    /// Upper bound on any single port-reclaim subprocess.
    pub const RECLAIM_TIMEOUT: Duration = Duration::from_secs(3);
}

/// Where the backend is expected to answer HTTP once ready.
///
/// Immutable; derived from configuration at supervisor construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessTarget {
    /// TCP port on localhost.
    pub port: u16,
    /// Request path, including the leading slash.
    pub path: String,
}

impl ReadinessTarget {
    /// Create a target probing `/` on the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            path: "/".to_string(),
        }
    }

    /// The URL the prober requests and the shell ultimately loads.
    pub fn url(&self) -> String {
        format!("http://localhost:{}{}", self.port, self.path)
    }
}

/// Configuration for one supervised backend.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Path to the backend executable.
    pub command: PathBuf,
    /// Arguments passed to the backend.
    pub args: Vec<String>,
    /// Environment variables to set (keys unique).
    pub env_vars: HashMap<String, String>,
    /// Working directory for the backend.
    pub working_dir: Option<PathBuf>,
    /// Per-user data directory, injected as [`USER_DIR_ENV`]. The caller
    /// creates this directory before `start()`.
    pub user_data_dir: Option<PathBuf>,
    /// Port and path the backend serves once ready.
    pub target: ReadinessTarget,
    /// Substring of a stdout line that signals readiness, if the backend
    /// prints one. When unset, only the HTTP prober signals readiness.
    pub ready_marker: Option<String>,
    /// Overall readiness deadline.
    pub ready_timeout: Duration,
    /// Interval between readiness probes.
    pub probe_interval: Duration,
    /// Grace period for the graceful termination step.
    pub term_grace: Duration,
    /// Confirmation wait for the forceful termination step.
    pub kill_confirm: Duration,
    /// Executable image name used for the last-resort by-name kill when
    /// group termination cannot be confirmed.
    pub executable_name: Option<String>,
}

impl SupervisorConfig {
    /// Create a config with default time budgets.
    pub fn new(command: impl Into<PathBuf>, port: u16) -> Self {
        let command = command.into();
        let executable_name = command
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        Self {
            command,
            args: vec![],
            env_vars: HashMap::new(),
            working_dir: None,
            user_data_dir: None,
            target: ReadinessTarget::new(port),
            ready_marker: None,
            ready_timeout: SupervisorTiming::READY_TIMEOUT,
            probe_interval: SupervisorTiming::PROBE_INTERVAL,
            term_grace: SupervisorTiming::TERM_GRACE,
            kill_confirm: SupervisorTiming::KILL_CONFIRM,
            executable_name,
        }
    }

    /// Set the argument list.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add a single argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the per-user data directory.
    pub fn with_user_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.user_data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the readiness probe path (default `/`).
    pub fn with_ready_path(mut self, path: impl Into<String>) -> Self {
        self.target.path = path.into();
        self
    }

    /// Set the stdout ready marker.
    pub fn with_ready_marker(mut self, marker: impl Into<String>) -> Self {
        self.ready_marker = Some(marker.into());
        self
    }

    /// Set the overall readiness deadline.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Set the termination budgets.
    pub fn with_termination_budgets(mut self, grace: Duration, confirm: Duration) -> Self {
        self.term_grace = grace;
        self.kill_confirm = confirm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_target_url() {
        let target = ReadinessTarget::new(8501);
        assert_eq!(target.url(), "http://localhost:8501/");

        let mut target = ReadinessTarget::new(9000);
        target.path = "/health".to_string();
        assert_eq!(target.url(), "http://localhost:9000/health");
    }

    #[test]
    fn test_config_defaults() {
        let config = SupervisorConfig::new("/opt/halide/backend", 8501);
        assert_eq!(config.target.port, 8501);
        assert_eq!(config.executable_name.as_deref(), Some("backend"));
        assert!(config.ready_marker.is_none());
        assert_eq!(config.probe_interval, SupervisorTiming::PROBE_INTERVAL);
    }

    #[test]
    fn test_config_builder() {
        let config = SupervisorConfig::new("/usr/bin/python", 8501)
            .with_arg("-m")
            .with_arg("app")
            .with_env("HEADLESS", "1")
            .with_user_data_dir("/home/user/Documents/Halide")
            .with_ready_marker("URL: http://localhost:8501")
            .with_ready_timeout(Duration::from_secs(30));

        assert_eq!(config.args, vec!["-m".to_string(), "app".to_string()]);
        assert_eq!(config.env_vars.get("HEADLESS"), Some(&"1".to_string()));
        assert_eq!(
            config.ready_marker.as_deref(),
            Some("URL: http://localhost:8501")
        );
        assert_eq!(config.ready_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_timing_budgets_are_bounded() {
        // Shutdown latency must stay bounded even under a stuck child.
        assert!(SupervisorTiming::TERM_GRACE + SupervisorTiming::KILL_CONFIRM < Duration::from_secs(10));
    }
}
