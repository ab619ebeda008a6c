//! Platform abstraction layer for process control.
//!
//! All `#[cfg]` blocks for OS-specific process handling live here. Callers
//! never branch on platform, only on the returned [`TerminationOutcome`].

pub mod process;

pub use process::{
    is_process_alive, kill_pid, kill_processes_by_name, terminate_group, TerminationOutcome,
};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
