use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use vaultd::config::ConfigStore;
use vaultd::console;
use vaultd::coordinator::Coordinator;
use vaultd::host::rcon::RconBridge;
use vaultd::lock;
use vaultd::notify::StatusHub;

const CONFIG_FILE: &str = "vaultd.json";
const STATUS_HISTORY_LINES: usize = 500;
const DRAIN_WAIT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(
    name = "vaultd",
    version,
    about = "Periodic archive backups for a managed game server"
)]
struct Cli {
    /// Server directory to snapshot and watch.
    #[arg(long, default_value = ".")]
    server_root: PathBuf,

    /// Config file path; defaults to <server-root>/vaultd.json.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    // single-instance lock
    let lock_path = cli.server_root.join(".vaultd.lock");
    let _guard = match lock::acquire_lock(&lock_path) {
        Ok(guard) => guard,
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
            warn!("another vaultd instance holds the lock, exiting");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.server_root.join(CONFIG_FILE));
    let store = ConfigStore::new(config_path);
    let config = store.load().map_err(anyhow::Error::msg)?;

    let hub = Arc::new(StatusHub::new(STATUS_HISTORY_LINES));
    let host = Arc::new(RconBridge::new(cli.server_root.clone()));
    let coordinator = Arc::new(Coordinator::new(
        config,
        store,
        host,
        hub,
        cli.server_root.clone(),
    ));

    coordinator.start();
    tokio::spawn(console::tail_console(
        cli.server_root.join("logs").join("latest.log"),
        Arc::clone(&coordinator),
    ));
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "vaultd running; next backup: {}",
        coordinator.next_backup_message()
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    coordinator.stop();
    coordinator.drain(DRAIN_WAIT).await;
    Ok(())
}
