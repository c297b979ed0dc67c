//! Inode ↔ path mapping for the read-only torrent filesystem
//!
//! The tree under a mount never changes shape once metadata has arrived, so
//! inodes are handed out on first lookup and never recycled.

use std::collections::HashMap;

use common::fs::clean_path;

#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.path_to_inode.insert("/".to_string(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, "/".to_string());
        table
    }

    /// Inode for `path`, allocating one on first sight
    pub fn get_or_create(&mut self, path: &str) -> u64 {
        let path = clean_path(path);
        if let Some(&inode) = self.path_to_inode.get(&path) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(path.clone(), inode);
        self.inode_to_path.insert(inode, path);
        inode
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(&clean_path(path)).copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    /// Inode of the directory containing `inode` (root is its own parent)
    pub fn parent_inode(&mut self, inode: u64) -> Option<u64> {
        let parent = parent_path(self.get_path(inode)?);
        Some(self.get_or_create(&parent))
    }

    pub fn len(&self) -> usize {
        self.inode_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Join a directory path and an entry name
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

pub fn parent_path(path: &str) -> String {
    let path = clean_path(path);
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_inode() {
        let table = InodeTable::new();
        assert_eq!(table.get_inode("/"), Some(InodeTable::ROOT_INODE));
        assert_eq!(table.get_path(InodeTable::ROOT_INODE), Some("/"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let mut table = InodeTable::new();

        let foo = table.get_or_create("/foo");
        let again = table.get_or_create("foo/");
        let bar = table.get_or_create("/bar");

        assert_eq!(foo, again);
        assert_ne!(foo, bar);
        assert_ne!(foo, InodeTable::ROOT_INODE);
        assert_eq!(table.get_path(bar), Some("/bar"));
    }

    #[test]
    fn test_parent_inode() {
        let mut table = InodeTable::new();
        let file = table.get_or_create("/t/dir/file");

        let dir = table.parent_inode(file).unwrap();
        assert_eq!(table.get_path(dir), Some("/t/dir"));
        assert_eq!(
            table.parent_inode(InodeTable::ROOT_INODE),
            Some(InodeTable::ROOT_INODE)
        );
        assert!(table.parent_inode(9999).is_none());
    }

    #[test]
    fn test_child_and_parent_path() {
        assert_eq!(child_path("/", "a"), "/a");
        assert_eq!(child_path("/a", "b.txt"), "/a/b.txt");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("/foo"), "/");
        assert_eq!(parent_path("/foo/bar/baz"), "/foo/bar");
    }
}
