//! Platform-specific process-group termination.
//!
//! The launcher guarantees every supervised backend is the leader of its own
//! process group (Unix) or job-style tree (Windows), so termination here is
//! always group-wide. Escalation is ordered and each step is bounded: a
//! graceful group signal, a forceful group kill, and an outcome that tells
//! the caller whether the group was confirmed gone.

use std::time::Duration;
use tracing::{debug, warn};

/// Result of a group termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The group exited within the grace period after the graceful request.
    Graceful,
    /// The group had to be forcefully killed and is confirmed gone.
    Forced,
    /// Escalation exhausted without confirming the group is gone.
    Unconfirmed,
}

impl TerminationOutcome {
    /// Whether the process group is confirmed dead.
    pub fn confirmed(&self) -> bool {
        !matches!(self, TerminationOutcome::Unconfirmed)
    }
}

/// Check if a process with the given PID is alive.
///
/// A zombie counts as alive until its parent reaps it; the supervisor's exit
/// monitor reaps the direct child, so liveness settles promptly.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 probes existence without delivering anything.
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        // SAFETY: OpenProcess/CloseHandle are plain handle-based Win32 calls;
        // a null return is checked before the handle is used.
        #[allow(unsafe_code)]
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                false
            } else {
                CloseHandle(handle);
                true
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        warn!("Process alive check not implemented for this platform");
        true
    }
}

/// Forcefully kill a single process. Best effort; errors are logged.
pub fn kill_pid(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            if e != nix::errno::Errno::ESRCH {
                warn!("Failed to kill process {}: {}", pid, e);
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output();
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
    }
}

/// Terminate the process group led by `pid`, escalating within bounded time.
///
/// Unix: SIGTERM to the group, wait up to `grace`, then SIGKILL to the
/// group, wait up to `confirm`. Windows: `taskkill /T /F` on the tree (no
/// reliable graceful signal for console servers), wait up to `confirm`.
pub async fn terminate_group(pid: u32, grace: Duration, confirm: Duration) -> TerminationOutcome {
    if !is_process_alive(pid) {
        debug!("Process {} is not running", pid);
        return TerminationOutcome::Graceful;
    }

    #[cfg(unix)]
    {
        terminate_group_unix(pid, grace, confirm).await
    }

    #[cfg(windows)]
    {
        let _ = grace;
        terminate_group_windows(pid, confirm).await
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (grace, confirm);
        TerminationOutcome::Unconfirmed
    }
}

/// Poll liveness until the process is gone or the deadline elapses.
async fn wait_for_death(pid: u32, deadline: Duration) -> bool {
    let interval = Duration::from_millis(100);
    let start = std::time::Instant::now();

    while start.elapsed() < deadline {
        if !is_process_alive(pid) {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    !is_process_alive(pid)
}

#[cfg(unix)]
async fn terminate_group_unix(pid: u32, grace: Duration, confirm: Duration) -> TerminationOutcome {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(pid as i32);

    debug!("Sending SIGTERM to process group {}", pid);
    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return TerminationOutcome::Graceful;
        }
        warn!("Failed to send SIGTERM to group {}: {}", pid, e);
    }

    if wait_for_death(pid, grace).await {
        debug!("Process group {} terminated gracefully", pid);
        return TerminationOutcome::Graceful;
    }

    debug!("Process group {} still running, sending SIGKILL", pid);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        if e == nix::errno::Errno::ESRCH {
            return TerminationOutcome::Forced;
        }
        warn!("Failed to send SIGKILL to group {}: {}", pid, e);
    }

    if wait_for_death(pid, confirm).await {
        TerminationOutcome::Forced
    } else {
        warn!("Process group {} survived SIGKILL window", pid);
        TerminationOutcome::Unconfirmed
    }
}

#[cfg(windows)]
async fn terminate_group_windows(pid: u32, confirm: Duration) -> TerminationOutcome {
    use tokio::process::Command;

    // /T kills the whole tree, /F forces. taskkill without /F only posts
    // WM_CLOSE, which console backends ignore.
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            debug!("taskkill terminated tree {}", pid);
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // "not found" means the tree is already gone
            if !stderr.contains("not found") && !stderr.contains("not running") {
                warn!("taskkill failed for {}: {}", pid, stderr);
            }
        }
        Ok(Err(e)) => warn!("Failed to run taskkill: {}", e),
        Err(_) => warn!("taskkill timed out for {}", pid),
    }

    if wait_for_death(pid, confirm).await {
        TerminationOutcome::Forced
    } else {
        TerminationOutcome::Unconfirmed
    }
}

/// Kill every process whose image name matches `name`. Last-resort safety
/// net when group termination cannot be confirmed. Never targets the
/// calling process. Returns the number of processes signalled.
pub async fn kill_processes_by_name(name: &str) -> usize {
    #[cfg(unix)]
    {
        kill_by_name_unix(name).await
    }

    #[cfg(windows)]
    {
        kill_by_name_windows(name).await
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = name;
        0
    }
}

#[cfg(unix)]
async fn kill_by_name_unix(name: &str) -> usize {
    use tokio::process::Command;

    let output = match Command::new("ps").args(["-eo", "pid=,comm="]).output().await {
        Ok(o) => o,
        Err(e) => {
            debug!("Failed to run ps: {}", e);
            return 0;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let own_pid = std::process::id();
    let mut killed = 0;

    for (pid, comm) in parse_ps_lines(&stdout) {
        if pid == own_pid {
            continue;
        }
        if comm == name {
            debug!("Killing {} by name ({})", pid, name);
            kill_pid(pid);
            killed += 1;
        }
    }
    killed
}

#[cfg(windows)]
async fn kill_by_name_windows(name: &str) -> usize {
    use tokio::process::Command;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        Command::new("taskkill").args(["/IM", name, "/F"]).output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => 1,
        _ => 0,
    }
}

/// Parse `ps -eo pid=,comm=` output into (pid, command-name) pairs.
#[cfg_attr(not(unix), allow(dead_code))]
fn parse_ps_lines(output: &str) -> Vec<(u32, String)> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, comm) = line.split_once(char::is_whitespace)?;
            let pid: u32 = pid.trim().parse().ok()?;
            Some((pid, comm.trim().to_string()))
        })
        .collect()
}
