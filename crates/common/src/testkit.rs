//! Scripted download engine for tests
//!
//! [`MockClient`] hands out pre-registered [`MockTorrent`]s by magnet URI or
//! torrent path and rejects anything else. A `MockTorrent` can start without
//! metadata and have it delivered later, which lets tests observe what
//! happens while a mount is waiting on a slow swarm.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::torrent::{InfoHash, SwarmStats, Torrent, TorrentClient, TorrentFile, TorrentHandle};

#[derive(Debug, Default)]
struct Payload {
    name: Option<String>,
    files: Vec<TorrentFile>,
    data: Vec<Vec<u8>>,
}

/// In-memory torrent whose metadata can be delayed
#[derive(Debug)]
pub struct MockTorrent {
    info_hash: InfoHash,
    payload: RwLock<Payload>,
    info_ready: watch::Sender<bool>,
    stats: Mutex<SwarmStats>,
}

impl MockTorrent {
    /// Torrent whose metadata is known up front
    pub fn new(id: u8, name: &str) -> Arc<Self> {
        Self::with_files(id, name, vec![])
    }

    /// Torrent with metadata and file contents known up front
    pub fn with_files(id: u8, name: &str, files: Vec<(&str, Vec<u8>)>) -> Arc<Self> {
        let torrent = Self::pending(id);
        torrent.deliver_info(name, files);
        torrent
    }

    /// Torrent whose metadata has not arrived yet
    pub fn pending(id: u8) -> Arc<Self> {
        let (info_ready, _) = watch::channel(false);
        Arc::new(Self {
            info_hash: InfoHash::new([id; 20]),
            payload: RwLock::new(Payload::default()),
            info_ready,
            stats: Mutex::new(SwarmStats::default()),
        })
    }

    /// Publish the name and files, waking anyone in `got_info`
    pub fn deliver_info(&self, name: &str, files: Vec<(&str, Vec<u8>)>) {
        {
            let mut payload = self.payload.write();
            payload.name = Some(name.to_string());
            payload.files = files
                .iter()
                .map(|(path, data)| TorrentFile::new(*path, data.len() as u64))
                .collect();
            payload.data = files.into_iter().map(|(_, data)| data).collect();
        }
        self.info_ready.send_replace(true);
    }

    pub fn set_swarm_stats(&self, stats: SwarmStats) {
        *self.stats.lock() = stats;
    }

    pub fn has_info(&self) -> bool {
        *self.info_ready.borrow()
    }
}

#[async_trait]
impl TorrentHandle for MockTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn name(&self) -> Option<String> {
        self.payload.read().name.clone()
    }

    async fn got_info(&self) {
        let mut ready = self.info_ready.subscribe();
        // The sender lives as long as `self`, so this only ends once ready
        let _ = ready.wait_for(|ready| *ready).await;
    }

    fn files(&self) -> Vec<TorrentFile> {
        self.payload.read().files.clone()
    }

    fn read_at(&self, file: usize, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let payload = self.payload.read();
        let data = payload
            .data
            .get(file)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file in torrent"))?;
        let start = (offset as usize).min(data.len());
        let n = (data.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn swarm_stats(&self) -> SwarmStats {
        *self.stats.lock()
    }
}

/// Engine that only knows the torrents registered with it
#[derive(Debug, Default)]
pub struct MockClient {
    magnets: Mutex<HashMap<String, Torrent>>,
    files: Mutex<HashMap<PathBuf, Torrent>>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register_magnet(&self, uri: &str, torrent: Torrent) {
        self.magnets.lock().insert(uri.to_string(), torrent);
    }

    pub fn register_file(&self, path: impl Into<PathBuf>, torrent: Torrent) {
        self.files.lock().insert(path.into(), torrent);
    }

    /// Every add call in order, as `magnet:<uri>` or `file:<path>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TorrentClient for MockClient {
    async fn add_magnet(&self, uri: &str) -> anyhow::Result<Torrent> {
        self.calls.lock().push(format!("magnet:{}", uri));
        self.magnets
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("invalid magnet uri: {}", uri))
    }

    async fn add_torrent_file(&self, path: &Path) -> anyhow::Result<Torrent> {
        self.calls.lock().push(format!("file:{}", path.display()));
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unable to read torrent file {}", path.display()))
    }
}
