use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{File, FileRef, Filesystem, FsError, Storage};
use crate::torrent::Torrent;

/// Filesystem view of a single torrent
///
/// The tree is built from the handle's file list on first access after
/// metadata has arrived. Before that the torrent shows up as an empty
/// directory.
pub struct TorrentFs {
    torrent: Torrent,
    storage: RwLock<Option<Arc<Storage>>>,
}

impl TorrentFs {
    pub fn new(torrent: Torrent) -> Self {
        Self {
            torrent,
            storage: RwLock::new(None),
        }
    }

    pub fn torrent(&self) -> &Torrent {
        &self.torrent
    }

    fn storage(&self) -> Arc<Storage> {
        if let Some(storage) = self.storage.read().as_ref() {
            return storage.clone();
        }

        let files = self.torrent.files();
        let mut storage = Storage::new();
        for (index, file) in files.iter().enumerate() {
            let entry = TorrentEntry {
                torrent: self.torrent.clone(),
                index,
                length: file.length,
            };
            storage.add(Arc::new(entry), &file.path);
        }
        let storage = Arc::new(storage);

        // Cache only once the engine has told us what is inside
        if !files.is_empty() {
            *self.storage.write() = Some(storage.clone());
        }
        storage
    }
}

impl Filesystem for TorrentFs {
    fn open(&self, path: &str) -> Result<FileRef, FsError> {
        self.storage().get(path)
    }

    fn read_dir(&self, path: &str) -> Result<BTreeMap<String, FileRef>, FsError> {
        self.storage().children(path)
    }
}

impl std::fmt::Debug for TorrentFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorrentFs")
            .field("info_hash", &self.torrent.info_hash())
            .field("name", &self.torrent.name())
            .finish()
    }
}

/// One payload file, read through the engine
pub struct TorrentEntry {
    torrent: Torrent,
    index: usize,
    length: u64,
}

impl File for TorrentEntry {
    fn is_dir(&self) -> bool {
        false
    }

    fn size(&self) -> u64 {
        self.length
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.length {
            return Ok(0);
        }
        let remaining = (self.length - offset).min(buf.len() as u64) as usize;
        self.torrent.read_at(self.index, offset, &mut buf[..remaining])
    }
}
