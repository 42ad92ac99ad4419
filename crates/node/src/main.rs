use anyhow::Context;
use bridgewatch_storage::Storage;
#[cfg(not(feature = "rocksdb"))]
use bridgewatch_storage::InMemoryStorage;
#[cfg(feature = "rocksdb")]
use bridgewatch_storage::RocksDBStorage;
use bridgewatch_types::PendingSwap;
use bridgewatch_watcher::{Watcher, WatcherConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg_attr(not(feature = "rocksdb"), allow(dead_code))]
fn get_storage_path() -> PathBuf {
    std::env::var("STORAGE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
}

fn init_storage() -> anyhow::Result<Arc<dyn Storage>> {
    #[cfg(feature = "rocksdb")]
    {
        let path = get_storage_path();
        std::fs::create_dir_all(&path).context("Failed to create storage directory")?;

        info!("Initializing RocksDB storage at: {}", path.display());
        let storage = RocksDBStorage::open(&path).context("Failed to open RocksDB storage")?;

        Ok(Arc::new(storage))
    }

    #[cfg(not(feature = "rocksdb"))]
    {
        info!("Using InMemoryStorage (RocksDB not enabled)");
        Ok(Arc::new(InMemoryStorage::new()))
    }
}

/// Hands swaps to settlement. Settlement deduplicates by (platform, hash).
fn forward_swaps(swaps: Vec<PendingSwap>) {
    for swap in swaps {
        info!(
            "Pending swap: platform={}, tx={}, from={}, to={}",
            swap.platform, swap.hash, swap.source_address, swap.destination_address
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = WatcherConfig::from_env().context("Invalid configuration")?;
    let storage = init_storage()?;
    let cancel = CancellationToken::new();

    let mut watcher = Watcher::from_config(&config, storage.clone(), cancel.clone())
        .await
        .context("Failed to start watchers")?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });

    info!(
        "Polling {} every {}s",
        config.platforms.join(","),
        config.poll_interval_seconds
    );

    watcher
        .run(Duration::from_secs(config.poll_interval_seconds), forward_swaps)
        .await?;

    storage.flush().context("Failed to flush storage")?;
    Ok(())
}
