//! Per-user data directory resolution.
//!
//! The backend keeps its state in a visible folder under the user's
//! Documents (falling back to the home directory), so users can find and
//! back up their data without digging through hidden app-support paths.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "Halide";

/// Resolve the default per-user data directory without creating it.
pub fn user_data_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Create `dir` (and parents) if missing, returning it back.
pub fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    Ok(dir)
}
