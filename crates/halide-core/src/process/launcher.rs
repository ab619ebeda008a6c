//! Backend process launching.
//!
//! The backend is spawned as the leader of its own process group so the
//! whole subtree can be terminated atomically later; the supervised server
//! may spawn helper subprocesses of its own. Stdout and stderr are piped
//! back to the supervisor for line streaming and ready-marker scanning.

use crate::config::{SupervisorConfig, USER_DIR_ENV};
use crate::error::{HalideError, Result};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::info;

/// One launched backend instance, owned exclusively by the supervisor.
#[derive(Debug)]
pub struct SupervisedProcess {
    /// Process ID; on Unix this is also the process-group ID.
    pub pid: u32,
    /// When the process was spawned.
    pub started_at: Instant,
    pub(crate) child: Child,
    pub(crate) stdout: Option<ChildStdout>,
    pub(crate) stderr: Option<ChildStderr>,
}

/// Launches the backend described by a [`SupervisorConfig`].
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Spawn the backend as its own process group with piped output.
    ///
    /// Fails with [`HalideError::Launch`] when the executable is missing or
    /// the OS refuses to start it.
    pub fn launch(config: &SupervisorConfig) -> Result<SupervisedProcess> {
        // A bare command name resolves through PATH; only a concrete path
        // can be validated up front.
        if config.command.is_absolute() && !config.command.exists() {
            return Err(HalideError::Launch {
                message: format!("Executable not found: {}", config.command.display()),
                source: None,
            });
        }

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }
        if let Some(ref dir) = config.user_data_dir {
            cmd.env(USER_DIR_ENV, dir);
        }
        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // Start as group/tree root so termination covers descendants.
        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        info!(
            "Launching backend: {} {}",
            config.command.display(),
            config.args.join(" ")
        );

        let mut child = cmd.spawn().map_err(|e| HalideError::Launch {
            message: format!("Failed to spawn {}: {}", config.command.display(), e),
            source: Some(e),
        })?;

        let pid = child.id().ok_or_else(|| HalideError::Launch {
            message: "Backend exited before its pid could be read".to_string(),
            source: None,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        info!("Backend started with PID {}", pid);

        Ok(SupervisedProcess {
            pid,
            started_at: Instant::now(),
            child,
            stdout,
            stderr,
        })
    }
}
