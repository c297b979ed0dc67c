//! Download engine seam
//!
//! tormount does not speak the peer protocol itself. An engine plugs in by
//! implementing [`TorrentClient`], which hands out [`TorrentHandle`]s for
//! magnet links and torrent files. A handle may exist before its metadata
//! ("info") has arrived; until then it has no name and no file list.

use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod info_hash;
mod source;

pub use info_hash::{InfoHash, ParseInfoHashError};
pub use source::{InvalidSource, SourceKind, TorrentSource};

/// Shared reference to a swarm owned by the engine
pub type Torrent = Arc<dyn TorrentHandle>;

/// One payload file inside a torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// `/`-separated path relative to the torrent root
    pub path: String,
    /// Length in bytes
    pub length: u64,
}

impl TorrentFile {
    pub fn new(path: impl Into<String>, length: u64) -> Self {
        Self {
            path: path.into(),
            length,
        }
    }
}

/// Point-in-time swarm counters reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmStats {
    pub active_peers: u32,
    pub total_peers: u32,
    pub bytes_downloaded: u64,
    pub bytes_uploaded: u64,
}

#[async_trait]
pub trait TorrentHandle: Send + Sync + Debug {
    /// Content identifier of the swarm
    fn info_hash(&self) -> InfoHash;

    /// Display name, `None` until metadata has propagated
    fn name(&self) -> Option<String>;

    /// Resolve once the name and file list are known
    async fn got_info(&self);

    /// Payload files, empty until metadata has propagated
    fn files(&self) -> Vec<TorrentFile>;

    /// Read payload bytes of `files()[file]` starting at `offset`.
    ///
    /// This blocks until the engine can serve the requested range, which
    /// may involve fetching pieces from the swarm. Returns `Ok(0)` at EOF.
    fn read_at(&self, file: usize, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn swarm_stats(&self) -> SwarmStats;

    /// Name if known and non-empty
    fn known_name(&self) -> Option<String> {
        self.name().filter(|name| !name.is_empty())
    }
}

#[async_trait]
pub trait TorrentClient: Send + Sync + 'static {
    /// Add a swarm by magnet URI
    async fn add_magnet(&self, uri: &str) -> anyhow::Result<Torrent>;

    /// Add a swarm from a torrent descriptor file on disk
    async fn add_torrent_file(&self, path: &Path) -> anyhow::Result<Torrent>;

    /// Add whatever `source` points at
    async fn add_source(&self, source: SourceKind<'_>) -> anyhow::Result<Torrent> {
        match source {
            SourceKind::Magnet(uri) => self.add_magnet(uri).await,
            SourceKind::File(path) => self.add_torrent_file(path).await,
        }
    }
}
