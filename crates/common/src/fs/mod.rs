//! Virtual filesystem over torrent payloads
//!
//! # Architecture
//!
//! - `Storage`: path tree with implicit parent directories
//! - `TorrentFs`: one torrent's files as a tree
//! - `ContainerFs`: several `TorrentFs` side by side under one root
//!
//! Every path handed to a [`Filesystem`] is normalized first: a leading `/`,
//! no trailing `/`, and the empty string means the root.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

mod container;
mod storage;
mod torrent;

pub use container::ContainerFs;
pub use storage::Storage;
pub use torrent::{TorrentEntry, TorrentFs};

pub type FileRef = Arc<dyn File>;

pub trait File: Send + Sync {
    fn is_dir(&self) -> bool;

    /// Size in bytes (0 for directories)
    fn size(&self) -> u64;

    /// Read into `buf` starting at `offset`. Returns `Ok(0)` at EOF.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

pub trait Filesystem: Send + Sync {
    fn open(&self, path: &str) -> Result<FileRef, FsError>;

    fn read_dir(&self, path: &str) -> Result<BTreeMap<String, FileRef>, FsError>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
}

/// Directory marker
#[derive(Debug, Clone, Copy, Default)]
pub struct Dir;

impl File for Dir {
    fn is_dir(&self) -> bool {
        true
    }

    fn size(&self) -> u64 {
        0
    }

    fn read_at(&self, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Other,
            "cannot read from a directory",
        ))
    }
}

/// Normalize a path to a consistent format
pub fn clean_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.trim().split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if let Some(pos) = normalized.rfind('/') {
                    normalized.truncate(pos);
                }
            }
            segment => {
                normalized.push('/');
                normalized.push_str(segment);
            }
        }
    }

    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Split a normalized path into its first component and the remainder
pub(crate) fn split_first(path: &str) -> (&str, String) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.find('/') {
        Some(pos) => (&trimmed[..pos], trimmed[pos..].to_string()),
        None => (trimmed, "/".to_string()),
    }
}
