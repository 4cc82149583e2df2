// Logging behavior:
// - Writes logs to both stderr and a daily-rotated file at logs/stagehand.log.
// - Default log level is INFO. Control via RUST_LOG:
//   * RUST_LOG=info                        # Standard logging (default)
//   * RUST_LOG=debug                       # Verbose debugging
//   * RUST_LOG=stagehand_app=info,stagehand_script=trace  # Per-module control
// - The logs/ directory is created on startup if missing; file output uses a non-blocking writer.
// - File layer disables ANSI to keep logs clean for analysis.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stagehand_app::settings::Settings;
use stagehand_app::status::serve_status;
use stagehand_app::supervisor::{ProcessSupervisor, WorkerKind};
use stagehand_app::worker;
use stagehand_foundation::ShutdownHandler;
use std::sync::Arc;
use tokio::sync::Mutex;

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>>
{
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "stagehand.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Prune rotated log files in `logs/` older than `retention_days` days.
/// `Some(0)` disables pruning. Defaults to 7 days when `None`.
fn prune_old_logs(retention_days: Option<u64>) {
    let retention = retention_days.unwrap_or(7);
    if retention == 0 {
        tracing::debug!("log retention disabled (retention_days=0)");
        return;
    }

    let cutoff = match SystemTime::now().checked_sub(Duration::from_secs(retention * 24 * 60 * 60))
    {
        Some(t) => t,
        None => return,
    };

    let logs_dir = Path::new("logs");
    if !logs_dir.exists() {
        return;
    }

    if let Ok(entries) = fs::read_dir(logs_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                if name.starts_with("stagehand.log.") {
                    if let Ok(meta) = entry.metadata() {
                        if let Ok(modified) = meta.modified() {
                            if modified < cutoff {
                                if let Err(e) = fs::remove_file(&path) {
                                    tracing::warn!("failed to remove old log {}: {}", path.display(), e);
                                } else {
                                    tracing::info!("removed old log file: {}", path.display());
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// The binary plays two roles, distinguished by `--worker`: with it absent
/// it is the supervisor (C10), spawning and watching the two pipeline
/// workers as child processes; with it present it re-execs as one of those
/// children, running exactly the named pipeline until told to stop.
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
struct Cli {
    /// Run as a worker process for this pipeline instead of as the supervisor.
    #[arg(long, value_enum)]
    worker: Option<WorkerArg>,

    /// Settings file to load (JSON). Defaults to `settings.json`.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Address the `/status` HTTP endpoint listens on, supervisor mode only.
    #[arg(long, default_value = "127.0.0.1:8787")]
    status_addr: std::net::SocketAddr,

    /// Log retention in days; 0 disables pruning.
    #[arg(long, env = "STAGEHAND_LOG_RETENTION_DAYS")]
    log_retention_days: Option<u64>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum WorkerArg {
    ScriptPointer,
    Tracking,
}

impl From<WorkerArg> for WorkerKind {
    fn from(value: WorkerArg) -> Self {
        match value {
            WorkerArg::ScriptPointer => WorkerKind::ScriptPointer,
            WorkerArg::Tracking => WorkerKind::Tracking,
        }
    }
}

#[tokio::main]
async fn main() {
    let _guard = init_logging().expect("failed to initialize logging");
    let cli = Cli::parse();
    prune_old_logs(cli.log_retention_days);

    if let Some(worker_arg) = cli.worker {
        let exit_code = worker::run_worker(worker_arg.into(), cli.settings).await;
        std::process::exit(exit_code);
    }

    run_supervisor(cli.settings, cli.status_addr).await;
}

/// Supervisor mode: load settings once (for validation — each worker reloads
/// its own copy so a crashed worker can be restarted against the same file),
/// start both pipeline workers, serve `/status`, and shut down cleanly on
/// Ctrl-C or either worker's own orderly exit.
async fn run_supervisor(settings_path: PathBuf, status_addr: std::net::SocketAddr) {
    if let Err(err) = Settings::new() {
        tracing::warn!(error = %err, "settings failed to validate at supervisor startup, workers will still attempt their own load");
    }

    let exe_path = std::env::current_exe().expect("failed to resolve own executable path");
    let supervisor = Arc::new(Mutex::new(ProcessSupervisor::new(exe_path, settings_path)));

    let shutdown = ShutdownHandler::new();
    shutdown.install_signal_handler();

    if !supervisor.lock().await.start(WorkerKind::ScriptPointer).await {
        tracing::error!("script-pointer worker failed to start");
    }
    if !supervisor.lock().await.start(WorkerKind::Tracking).await {
        tracing::error!("tracking worker failed to start");
    }

    let status_task = tokio::spawn(serve_status(supervisor.clone(), status_addr, shutdown.clone()));

    shutdown.wait().await;

    tracing::info!("supervisor shutting down, stopping workers");
    supervisor.lock().await.stop(WorkerKind::ScriptPointer).await;
    supervisor.lock().await.stop(WorkerKind::Tracking).await;

    let _ = status_task.await;
}
