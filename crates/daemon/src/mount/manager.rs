//! Mount lifecycle manager
//!
//! Resolves a mount point's torrent sources through the download engine,
//! composes them into one filesystem, prepares the target directory and
//! launches the OS projection in the background. Keeps the registry of
//! mounted paths and tears every mount down on request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use common::fs::{ContainerFs, TorrentFs};
use common::stats::StatsSink;
use common::torrent::{InfoHash, InvalidSource, Torrent, TorrentClient, TorrentSource};

use super::dirs::{prepare_mount_dir, DEFAULT_DIR_MODE};
use super::events::{EventFn, MountEvent};
use super::projection::{MountHost, Projector};
use super::registry::{LiveMount, MountRegistry};
use super::status::{AttachFailure, MountStatus};
use crate::config::MountPoint;

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("torrent source {index}: {source}")]
    InvalidSource {
        index: usize,
        #[source]
        source: InvalidSource,
    },
    #[error("failed to add torrent: {0}")]
    Engine(#[source] anyhow::Error),
    #[error("timed out waiting for torrent info: {info_hash}")]
    MetadataTimeout { info_hash: InfoHash },
    #[error("failed to create mount directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mount point already registered: {0}")]
    AlreadyMounted(String),
}

#[derive(Debug, Clone)]
pub struct MountManagerConfig {
    /// Upper bound on each torrent's metadata wait; `None` waits forever
    pub metadata_timeout: Option<Duration>,
    /// Permissions for created mount directories
    pub dir_mode: u32,
}

impl Default for MountManagerConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: None,
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

pub struct MountManager {
    client: Arc<dyn TorrentClient>,
    stats: Arc<dyn StatsSink>,
    projector: Arc<dyn Projector>,
    registry: Mutex<MountRegistry>,
    config: MountManagerConfig,
    failures_tx: flume::Sender<AttachFailure>,
    failures_rx: flume::Receiver<AttachFailure>,
}

impl MountManager {
    pub fn new(
        client: Arc<dyn TorrentClient>,
        stats: Arc<dyn StatsSink>,
        projector: Arc<dyn Projector>,
        config: MountManagerConfig,
    ) -> Self {
        let (failures_tx, failures_rx) = flume::unbounded();
        Self {
            client,
            stats,
            projector,
            registry: Mutex::new(MountRegistry::new()),
            config,
            failures_tx,
            failures_rx,
        }
    }

    /// Mount every torrent of `mount_point` at its path.
    ///
    /// The path is claimed for the whole call, so a concurrent request for
    /// the same path fails with [`MountError::AlreadyMounted`] before it
    /// touches the engine. Sources are resolved strictly in order, and a
    /// torrent listed twice is only added once. A source whose name is not
    /// known yet is waited on before the next one is looked at. Returns once
    /// the projection's attach has been launched; whether the attach then
    /// succeeds is reported through [`status`](Self::status),
    /// [`attach_failures`](Self::attach_failures) and the log.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn mount(&self, mount_point: &MountPoint, events: &EventFn) -> Result<(), MountError> {
        let path = mount_point.path.as_str();
        let claim = PathClaim::take(&self.registry, path)
            .ok_or_else(|| MountError::AlreadyMounted(path.to_string()))?;

        let mut entries = Vec::with_capacity(mount_point.torrents.len());
        let mut hashes = Vec::with_capacity(mount_point.torrents.len());
        for (index, source) in mount_point.torrents.iter().enumerate() {
            let torrent = self.resolve(index, source).await?;
            let info_hash = torrent.info_hash();

            if hashes.contains(&info_hash) {
                tracing::warn!(hash = %info_hash, path = %path, "torrent listed twice in mount point, skipping");
                continue;
            }

            // Only wait for info when there is no name to show yet
            if torrent.known_name().is_none() {
                events(&MountEvent::GettingInfo { info_hash });
                tracing::info!(hash = %info_hash, "getting torrent info");
                self.wait_for_info(&torrent).await?;
            }

            self.stats.add(path, torrent.clone());
            let name = torrent.known_name().unwrap_or_default();
            hashes.push(info_hash);
            entries.push(TorrentFs::new(torrent));

            events(&MountEvent::TorrentAdded {
                name: name.clone(),
                path: path.to_string(),
            });
            tracing::info!(name = %name, path = %path, "torrent added to mountpoint");
        }

        let target = Path::new(path);
        prepare_mount_dir(target, self.config.dir_mode).map_err(|source| {
            MountError::Directory {
                path: target.to_path_buf(),
                source,
            }
        })?;

        let fs = Arc::new(ContainerFs::new(entries));
        let host = self.projector.project(fs);
        let status = Arc::new(Mutex::new(MountStatus::Starting));

        let mount = LiveMount::new(host.clone(), status.clone(), hashes);
        if claim.commit(mount).is_err() {
            return Err(MountError::AlreadyMounted(path.to_string()));
        }

        self.spawn_attach(target.to_path_buf(), host, status);
        Ok(())
    }

    /// Mount each configured mount point in order, stopping at the first error
    pub async fn mount_all(
        &self,
        mount_points: &[MountPoint],
        events: &EventFn,
    ) -> Result<(), MountError> {
        for mount_point in mount_points {
            self.mount(mount_point, events).await?;
        }
        Ok(())
    }

    /// Detach every registered mount and forget all tracked torrents.
    ///
    /// Detach failures are logged and do not stop the sweep. The registry
    /// and the statistics sink end up empty either way.
    pub fn unmount_all(&self) {
        let mounts = self.registry.lock().drain();
        for (path, mount) in mounts {
            tracing::info!(path = %path, "unmounting");
            if let Err(err) = mount.host().unmount() {
                // TODO: fall back to a lazy/forced unmount for busy mount points
                tracing::error!(path = %path, error = %err, "unmount failed");
            }
        }
        self.stats.remove_all();
    }

    pub fn status(&self, path: &str) -> Option<MountStatus> {
        self.registry.lock().get(path).map(LiveMount::status)
    }

    /// Registered mount paths
    pub fn mounts(&self) -> Vec<String> {
        self.registry.lock().paths()
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.registry.lock().contains(path)
    }

    /// Failures of background attaches, in the order they happened
    pub fn attach_failures(&self) -> flume::Receiver<AttachFailure> {
        self.failures_rx.clone()
    }

    async fn resolve(&self, index: usize, source: &TorrentSource) -> Result<Torrent, MountError> {
        let kind = source
            .kind()
            .map_err(|source| MountError::InvalidSource { index, source })?;
        self.client
            .add_source(kind)
            .await
            .map_err(MountError::Engine)
    }

    async fn wait_for_info(&self, torrent: &Torrent) -> Result<(), MountError> {
        match self.config.metadata_timeout {
            Some(limit) => tokio::time::timeout(limit, torrent.got_info())
                .await
                .map_err(|_| MountError::MetadataTimeout {
                    info_hash: torrent.info_hash(),
                }),
            None => {
                torrent.got_info().await;
                Ok(())
            }
        }
    }

    fn spawn_attach(
        &self,
        mount_point: PathBuf,
        host: Arc<dyn MountHost>,
        status: Arc<Mutex<MountStatus>>,
    ) {
        let failures = self.failures_tx.clone();
        tokio::task::spawn_blocking(move || match host.mount(&mount_point) {
            Ok(()) => {
                *status.lock() = MountStatus::Stopped;
                tracing::info!(path = %mount_point.display(), "filesystem detached");
            }
            Err(err) => {
                *status.lock() = MountStatus::Error;
                tracing::error!(
                    path = %mount_point.display(),
                    error = %err,
                    "error trying to mount filesystem"
                );
                let _ = failures.send(AttachFailure {
                    path: mount_point,
                    error: err.to_string(),
                });
            }
        });
    }
}

/// Claim on a mount path, released on drop unless committed as a mount
struct PathClaim<'a> {
    registry: &'a Mutex<MountRegistry>,
    path: &'a str,
    committed: bool,
}

impl<'a> PathClaim<'a> {
    fn take(registry: &'a Mutex<MountRegistry>, path: &'a str) -> Option<Self> {
        if !registry.lock().reserve(path) {
            return None;
        }
        Some(Self {
            registry,
            path,
            committed: false,
        })
    }

    fn commit(mut self, mount: LiveMount) -> Result<(), LiveMount> {
        self.committed = true;
        let mut registry = self.registry.lock();
        registry.insert(self.path, mount)
    }
}

impl Drop for PathClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.lock().release(self.path);
        }
    }
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("registry", &*self.registry.lock())
            .field("config", &self.config)
            .finish()
    }
}
