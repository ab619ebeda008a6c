//! Halide Shell - desktop lifecycle controller for the Halide backend.
//!
//! Launches the backend server under supervision, waits for it to become
//! reachable, prints the URL for the embedding window layer, and guarantees
//! the backend's process tree is gone when the shell exits (including on
//! Ctrl-C).

mod controller;
mod paths;
mod view;

use anyhow::Result;
use clap::Parser;
use controller::ShellController;
use halide_core::{Supervisor, SupervisorConfig};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use view::ConsoleView;

#[derive(Parser, Debug)]
#[command(name = "halide-shell")]
#[command(about = "Desktop shell for the Halide backend")]
struct Args {
    /// Path to the backend executable
    backend: PathBuf,

    /// Port the backend serves on
    #[arg(short, long, default_value = "8501")]
    port: u16,

    /// Per-user data directory (defaults to Documents/Halide)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Stdout substring that signals readiness; the HTTP probe runs either way
    #[arg(long)]
    ready_marker: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Arguments passed through to the backend
    #[arg(trailing_var_arg = true)]
    backend_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Halide Shell");

    let data_dir = paths::ensure_dir(args.data_dir.unwrap_or_else(paths::user_data_dir))?;
    info!("User data directory: {}", data_dir.display());

    let mut config = SupervisorConfig::new(&args.backend, args.port)
        .with_args(args.backend_args)
        .with_user_data_dir(&data_dir);
    let marker = args
        .ready_marker
        .unwrap_or_else(|| format!("URL: http://localhost:{}", args.port));
    config = config.with_ready_marker(marker);

    let url = config.target.url();
    let (supervisor, events) = Supervisor::new(config);
    supervisor.start().await?;

    let session = ShellController::new(ConsoleView, url).run(events);
    tokio::select! {
        end = session => {
            info!("Session ended: {:?}", end);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    if let Err(e) = supervisor.stop().await {
        warn!("Backend teardown incomplete: {}", e);
    }
    Ok(())
}
