use std::collections::BTreeMap;
use std::sync::Arc;

use super::{clean_path, split_first, Dir, FileRef, Filesystem, FsError, TorrentFs};

/// Several torrents side by side under a single root
///
/// Each entry appears as a top-level directory named after its torrent.
/// When two torrents share a name, the later one is suffixed with the first
/// eight hex characters of its info hash.
pub struct ContainerFs {
    entries: BTreeMap<String, Arc<TorrentFs>>,
}

impl ContainerFs {
    pub fn new(entries: Vec<TorrentFs>) -> Self {
        let mut named = BTreeMap::new();
        for entry in entries {
            let torrent = entry.torrent();
            let info_hash = torrent.info_hash();
            let base = torrent
                .known_name()
                .map(|name| name.replace('/', "_"))
                .unwrap_or_else(|| info_hash.to_hex());

            let mut name = base.clone();
            if named.contains_key(&name) {
                name = format!("{}-{}", base, info_hash.short(8));
            }
            if named.contains_key(&name) {
                tracing::warn!(name = %name, hash = %info_hash, "duplicate torrent in mount point, skipping");
                continue;
            }
            named.insert(name, Arc::new(entry));
        }
        Self { entries: named }
    }

    /// Top-level directory names in order
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn route(&self, path: &str) -> Result<(&Arc<TorrentFs>, String), FsError> {
        let path = clean_path(path);
        let (name, rest) = split_first(&path);
        self.entries
            .get(name)
            .map(|fs| (fs, rest))
            .ok_or(FsError::NotFound(path))
    }
}

impl Filesystem for ContainerFs {
    fn open(&self, path: &str) -> Result<FileRef, FsError> {
        if clean_path(path) == "/" {
            return Ok(Arc::new(Dir));
        }
        let (fs, rest) = self.route(path)?;
        fs.open(&rest)
    }

    fn read_dir(&self, path: &str) -> Result<BTreeMap<String, FileRef>, FsError> {
        if clean_path(path) == "/" {
            return Ok(self
                .entries
                .keys()
                .map(|name| (name.clone(), Arc::new(Dir) as FileRef))
                .collect());
        }
        let (fs, rest) = self.route(path)?;
        fs.read_dir(&rest)
    }
}

impl std::fmt::Debug for ContainerFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerFs")
            .field("entries", &self.names())
            .finish()
    }
}
