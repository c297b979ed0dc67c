//! Daemon entry point: mount what the config declares, serve until told to
//! stop, then unmount everything.

use std::sync::Arc;

use anyhow::Context;

use common::stats::StatsSink;
use common::torrent::TorrentClient;

use crate::config::Config;
use crate::mount::{MountEvent, MountManager, Projector};

/// Mount every configured mount point and block until Ctrl-C.
///
/// Attach failures are logged as they arrive. All mounts are torn down
/// before returning, including when mounting a later point fails.
pub async fn run(
    config: &Config,
    client: Arc<dyn TorrentClient>,
    stats: Arc<dyn StatsSink>,
    projector: Arc<dyn Projector>,
) -> anyhow::Result<()> {
    let manager = Arc::new(MountManager::new(
        client,
        stats,
        projector,
        config.manager_config(),
    ));

    let failures = manager.attach_failures();
    let watcher = tokio::spawn(async move {
        while let Ok(failure) = failures.recv_async().await {
            tracing::warn!(path = %failure.path.display(), "{}", failure);
        }
    });

    let log_event = |event: &MountEvent| tracing::info!("{}", event);
    let mounted = manager.mount_all(&config.mount_points, &log_event).await;

    let result = match mounted {
        Ok(()) => {
            tracing::info!(
                mount_points = config.mount_points.len(),
                "all mount points launched, press Ctrl-C to unmount"
            );
            shutdown_signal().await
        }
        Err(err) => Err(err).context("failed to mount configured mount points"),
    };

    tracing::info!("unmounting all mount points");
    manager.unmount_all();
    watcher.abort();

    result
}

/// Resolve on Ctrl-C
pub async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    Ok(())
}
