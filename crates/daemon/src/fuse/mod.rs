//! FUSE projection of mounted torrents
//!
//! # Architecture
//!
//! - `FuseProjector`: builds one `FuseHost` per mount point
//! - `FuseHost`: owns the fuser session and its unmount handle
//! - `TorrentFuse`: read-only `fuser::Filesystem` over a `ContainerFs`
//! - `InodeTable`: bidirectional inode ↔ path mapping
//! - `BlockCache`: LRU cache with TTL for payload blocks

mod cache;
mod host;
mod inode_table;
mod torrent_fuse;

pub use cache::{BlockCache, BlockCacheConfig, CacheStats, BLOCK_SIZE};
pub use host::{mount_options, FuseHost, FuseProjector};
pub use inode_table::InodeTable;
pub use torrent_fuse::TorrentFuse;
