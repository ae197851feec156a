//! Scramble Sync - Native messaging host
//!
//! Chrome launches this binary for the timer page extension and talks to it
//! over stdin/stdout. Logs go to stderr so they never corrupt the channel.

use scramble_sync::messaging::{self, HostResponse};
use scramble_sync::{Config, EngineEvent, HttpSolver, LatestSnapshot, SyncEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config first so the log level can come from it
    let config = Config::load();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("Starting Scramble Sync");
    info!("Configuration loaded from {:?}", Config::default_config_path());

    if !config.general.enabled {
        info!("Scramble Sync is disabled in configuration, exiting");
        return Ok(());
    }

    let solver = Arc::new(HttpSolver::new(&config.solver)?);
    let snapshots = LatestSnapshot::new();

    let (events_tx, mut events_rx) = mpsc::channel::<EngineEvent>(64);
    let (replies_tx, replies_rx) = mpsc::channel::<HostResponse>(64);

    let (engine, handle) =
        SyncEngine::new(&config, solver, Arc::new(snapshots.clone()), events_tx)?;
    info!("Solver endpoint: {}", config.solver.base_url);

    // Engine events become outbound browser messages
    let forward_tx = replies_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if forward_tx.send(HostResponse::from(event)).await.is_err() {
                break;
            }
        }
    });

    // Plain threads so a blocked stdin read never holds up runtime shutdown
    let (writer_done_tx, writer_done_rx) = oneshot::channel::<()>();
    std::thread::spawn(move || {
        messaging::run_writer_loop(std::io::stdout().lock(), replies_rx);
        let _ = writer_done_tx.send(());
    });

    std::thread::spawn(move || {
        messaging::run_native_messaging_loop(std::io::stdin().lock(), snapshots, handle, replies_tx)
    });

    tokio::select! {
        _ = engine.run() => {
            info!("Browser channel closed, shutting down");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        }
    }

    // The reader thread may still hold a reply sender, so bound the flush
    if tokio::time::timeout(Duration::from_secs(1), writer_done_rx)
        .await
        .is_err()
    {
        info!("Writer still busy at shutdown, abandoning it");
    }

    Ok(())
}
