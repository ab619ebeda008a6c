//! Best-effort TCP port reclamation.
//!
//! A previous shell session that died without cleaning up can leave a
//! backend squatting on the port. Before launching, the supervisor fires
//! this reclaimer at the port: locate listeners, kill them, move on. A
//! failure here is logged and ignored; if a real conflict remains, the
//! backend's own bind will surface it.

use crate::config::SupervisorTiming;
use crate::platform;
use tracing::{debug, info, warn};

/// Frees a TCP port by killing whatever process is bound to it.
pub struct PortReclaimer;

impl PortReclaimer {
    /// Fire reclamation on a detached task. The caller never waits on it.
    pub fn spawn(port: u16) {
        tokio::spawn(async move {
            Self::reclaim(port).await;
        });
    }

    /// Locate and kill processes listening on `port`. Never fails; every
    /// subprocess call is bounded by a timeout. The calling process is
    /// never targeted.
    pub async fn reclaim(port: u16) {
        let pids = Self::listeners_on_port(port).await;
        if pids.is_empty() {
            debug!("No stale listeners on port {}", port);
            return;
        }

        let own_pid = std::process::id();
        for pid in pids {
            if pid == own_pid {
                continue;
            }
            info!("Reclaiming port {}: killing stale process {}", port, pid);
            platform::kill_pid(pid);
        }
    }

    /// Enumerate PIDs listening on `port`. Empty on any failure.
    async fn listeners_on_port(port: u16) -> Vec<u32> {
        #[cfg(unix)]
        {
            let output = Self::run_bounded("lsof", &["-ti".to_string(), format!(":{}", port)]).await;
            match output {
                Some(stdout) => parse_pid_lines(&stdout),
                None => vec![],
            }
        }

        #[cfg(windows)]
        {
            let output = Self::run_bounded("netstat", &["-aon".to_string()]).await;
            match output {
                Some(stdout) => parse_netstat_pids(&stdout, port),
                None => vec![],
            }
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = port;
            vec![]
        }
    }

    /// Run a command with a timeout, returning stdout on success.
    async fn run_bounded(cmd: &str, args: &[String]) -> Option<String> {
        let result = tokio::time::timeout(
            SupervisorTiming::RECLAIM_TIMEOUT,
            tokio::process::Command::new(cmd).args(args).output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            Ok(Err(e)) => {
                warn!("Port cleanup skipped: {} failed: {}", cmd, e);
                None
            }
            Err(_) => {
                warn!("Port cleanup skipped: {} timed out", cmd);
                None
            }
        }
    }
}

/// Parse one-PID-per-line output (`lsof -ti`).
fn parse_pid_lines(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Parse `netstat -aon` output for LISTENING sockets on `port`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_netstat_pids(output: &str, port: u16) -> Vec<u32> {
    let local_suffix = format!(":{}", port);
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            // Proto Local-Address Foreign-Address State PID
            if cols.len() < 5 || cols[0] != "TCP" || cols[3] != "LISTENING" {
                return None;
            }
            if !cols[1].ends_with(&local_suffix) {
                return None;
            }
            cols[4].parse().ok()
        })
        .collect();
    // IPv4 and IPv6 rows for the same listener are not adjacent.
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pid_lines() {
        assert_eq!(parse_pid_lines("123\n456\n"), vec![123, 456]);
        assert_eq!(parse_pid_lines(""), Vec::<u32>::new());
        assert_eq!(parse_pid_lines("garbage\n789\n"), vec![789]);
    }

    #[test]
    fn test_parse_netstat_pids() {
        let output = "\
  TCP    0.0.0.0:8501           0.0.0.0:0              LISTENING       4242
  TCP    127.0.0.1:9000         0.0.0.0:0              LISTENING       1111
  TCP    127.0.0.1:8501         127.0.0.1:55000        ESTABLISHED     4242
  UDP    0.0.0.0:8501           *:*                                    9999
  TCP    [::]:8501              [::]:0                 LISTENING       4242
";
        // The IPv4 and IPv6 rows for pid 4242 are not adjacent; it must
        // still be listed once.
        assert_eq!(parse_netstat_pids(output, 8501), vec![4242]);
        assert_eq!(parse_netstat_pids(output, 9000), vec![1111]);
        assert_eq!(parse_netstat_pids(output, 1), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn test_reclaim_free_port_is_noop() {
        // Nothing should be listening on this port; must not panic or hang.
        PortReclaimer::reclaim(1).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reclaim_kills_port_squatter() {
        use std::os::fd::AsRawFd;
        use std::os::unix::process::ExitStatusExt;

        // Without lsof the reclaimer degrades to a no-op; nothing to assert.
        if tokio::process::Command::new("lsof")
            .arg("-v")
            .output()
            .await
            .is_err()
        {
            return;
        }

        // A disposable child plays the stale session: it inherits our bound
        // listening socket (CLOEXEC cleared) and just sleeps while holding
        // it. The parent's copy is dropped, so the child is the only
        // process on the port and the own-pid skip is actually exercised.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        nix::fcntl::fcntl(
            listener.as_raw_fd(),
            nix::fcntl::FcntlArg::F_SETFD(nix::fcntl::FdFlag::empty()),
        )
        .unwrap();

        let mut child = tokio::process::Command::new("/bin/sh")
            .args(["-c", "exec sleep 30"])
            .spawn()
            .unwrap();
        drop(listener);

        PortReclaimer::reclaim(port).await;

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));

        // The port is bindable again.
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }
}
