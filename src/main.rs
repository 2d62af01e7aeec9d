use habitd::boundary;
use habitd::closer::AutoCloser;
use habitd::config::AppConfig;
use habitd::db::Database;
use habitd::scheduler::ClosingScheduler;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("habitd.yaml"));
    let config = AppConfig::load(&config_path)?;

    init_tracing(&config.log_dir)?;

    // A bad fallback zone is an operator error; fail fast instead of
    // discovering it mid-pass.
    let fallback_tz = boundary::resolve_timezone(&config.fallback_timezone)?;

    let db = Arc::new(Database::new(&config.db_path)?);
    let closer = Arc::new(AutoCloser::new(db, fallback_tz));
    let scheduler = ClosingScheduler::new(
        closer,
        Duration::from_secs(config.tick_interval_secs),
    );
    scheduler.start();

    tracing::info!(
        db = %config.db_path.display(),
        tick_interval_secs = config.tick_interval_secs,
        "habitd started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "habitd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))?;
    Ok(())
}
