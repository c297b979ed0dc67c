//! Shared building blocks for tormount.
//!
//! - [`torrent`]: the seam to the download engine (handles, sources, clients)
//! - [`fs`]: the virtual filesystem that projects torrents as directory trees
//! - [`stats`]: per-mount statistics sink
//!
//! The `testkit` feature adds a scripted in-memory engine for tests.

pub mod fs;
pub mod stats;
pub mod torrent;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub mod prelude {
    pub use crate::fs::{ContainerFs, File, FileRef, Filesystem, FsError, TorrentFs};
    pub use crate::stats::{StatsSink, TorrentStats};
    pub use crate::torrent::{
        InfoHash, SourceKind, Torrent, TorrentClient, TorrentFile, TorrentHandle, TorrentSource,
    };
}
