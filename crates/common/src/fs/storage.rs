use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{clean_path, Dir, FileRef, FsError};

/// Path tree of files with implicit parent directories
///
/// Adding `/a/b/c.txt` also registers `/a` and `/a/b` as directories.
pub struct Storage {
    /// Normalized path → file or directory
    entries: HashMap<String, FileRef>,
    /// Directory path → children by name
    children: HashMap<String, BTreeMap<String, FileRef>>,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    pub fn new() -> Self {
        let mut storage = Self {
            entries: HashMap::new(),
            children: HashMap::new(),
        };
        storage.entries.insert("/".to_string(), Arc::new(Dir));
        storage.children.insert("/".to_string(), BTreeMap::new());
        storage
    }

    /// Insert `file` at `path`, creating missing parents.
    ///
    /// An existing entry at the same path is replaced. Adding at the root
    /// is ignored.
    pub fn add(&mut self, file: FileRef, path: &str) {
        let path = clean_path(path);
        if path == "/" {
            return;
        }

        self.ensure_dir(&parent_of(&path));

        let name = name_of(&path).to_string();
        if file.is_dir() {
            self.children.entry(path.clone()).or_default();
        }
        self.children
            .entry(parent_of(&path))
            .or_default()
            .insert(name, file.clone());
        self.entries.insert(path, file);
    }

    pub fn get(&self, path: &str) -> Result<FileRef, FsError> {
        let path = clean_path(path);
        self.entries
            .get(&path)
            .cloned()
            .ok_or(FsError::NotFound(path))
    }

    pub fn children(&self, path: &str) -> Result<BTreeMap<String, FileRef>, FsError> {
        let path = clean_path(path);
        if let Some(children) = self.children.get(&path) {
            return Ok(children.clone());
        }
        if self.entries.contains_key(&path) {
            Err(FsError::NotADirectory(path))
        } else {
            Err(FsError::NotFound(path))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_dir(&mut self, path: &str) {
        if self.children.contains_key(path) {
            return;
        }
        let parent = parent_of(path);
        self.ensure_dir(&parent);

        let dir: FileRef = Arc::new(Dir);
        self.children
            .entry(parent)
            .or_default()
            .insert(name_of(path).to_string(), dir.clone());
        self.children.insert(path.to_string(), BTreeMap::new());
        self.entries.insert(path.to_string(), dir);
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}

fn name_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::fs::File;

    struct Blob(Vec<u8>);

    impl File for Blob {
        fn is_dir(&self) -> bool {
            false
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }

        fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
            let data = self.0.get(offset as usize..).unwrap_or_default();
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_root_exists() {
        let storage = Storage::new();
        assert!(storage.get("/").unwrap().is_dir());
        assert!(storage.children("/").unwrap().is_empty());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_add_creates_parents() {
        let mut storage = Storage::new();
        storage.add(Arc::new(Blob(vec![1, 2, 3])), "/a/b/c.txt");

        assert!(storage.get("/a").unwrap().is_dir());
        assert!(storage.get("/a/b").unwrap().is_dir());
        assert_eq!(storage.get("/a/b/c.txt").unwrap().size(), 3);

        let root = storage.children("/").unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["a"]);
        let b = storage.children("a/b/").unwrap();
        assert_eq!(b.keys().collect::<Vec<_>>(), vec!["c.txt"]);
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_siblings_share_parent() {
        let mut storage = Storage::new();
        storage.add(Arc::new(Blob(vec![])), "/dir/one");
        storage.add(Arc::new(Blob(vec![])), "/dir/two");

        let dir = storage.children("/dir").unwrap();
        assert_eq!(dir.len(), 2);
        assert!(dir.contains_key("one"));
        assert!(dir.contains_key("two"));
    }

    #[test]
    fn test_missing_and_not_dir() {
        let mut storage = Storage::new();
        storage.add(Arc::new(Blob(vec![])), "/file");

        assert_eq!(
            storage.get("/nope").err(),
            Some(FsError::NotFound("/nope".to_string()))
        );
        assert_eq!(
            storage.children("/file").err(),
            Some(FsError::NotADirectory("/file".to_string()))
        );
        assert_eq!(
            storage.children("/nope").err(),
            Some(FsError::NotFound("/nope".to_string()))
        );
    }
}
