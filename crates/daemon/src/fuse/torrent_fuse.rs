//! Read-only FUSE view of a composite torrent filesystem

use std::ffi::OsStr;
use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen, Request,
};

use common::fs::{File, FileRef, Filesystem, FsError};

use super::cache::{BlockCache, BLOCK_SIZE};
use super::inode_table::{child_path, InodeTable};

const DIR_PERM: u16 = 0o555;
const FILE_PERM: u16 = 0o444;

pub struct TorrentFuse {
    fs: Arc<dyn Filesystem>,
    inodes: InodeTable,
    cache: BlockCache,
    attr_ttl: Duration,
    uid: u32,
    gid: u32,
    /// Reported as every timestamp; torrents carry none
    created_at: SystemTime,
}

impl TorrentFuse {
    pub fn new(fs: Arc<dyn Filesystem>, cache: BlockCache, attr_ttl: Duration) -> Self {
        // SAFETY: getuid() and getgid() only read the calling process's
        // credentials and cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self {
            fs,
            inodes: InodeTable::new(),
            cache,
            attr_ttl,
            uid,
            gid,
            created_at: SystemTime::now(),
        }
    }

    fn path_of(&self, ino: u64) -> Result<String, FsError> {
        self.inodes
            .get_path(ino)
            .map(str::to_string)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", ino)))
    }

    fn file_of(&self, ino: u64) -> Result<FileRef, FsError> {
        let path = self.path_of(ino)?;
        self.fs.open(&path)
    }

    /// Resolve `name` under directory `parent`, allocating its inode
    fn lookup_child(&mut self, parent: u64, name: &str) -> Result<(u64, FileRef), FsError> {
        let path = child_path(&self.path_of(parent)?, name);
        let file = self.fs.open(&path)?;
        Ok((self.inodes.get_or_create(&path), file))
    }

    /// Directory listing including `.` and `..`
    fn list_dir(&mut self, ino: u64) -> Result<Vec<(u64, FileType, String)>, FsError> {
        let path = self.path_of(ino)?;
        let children = self.fs.read_dir(&path)?;
        let parent = self.inodes.parent_inode(ino).unwrap_or(InodeTable::ROOT_INODE);

        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push((ino, FileType::Directory, ".".to_string()));
        entries.push((parent, FileType::Directory, "..".to_string()));
        for (name, file) in children {
            let child = self.inodes.get_or_create(&child_path(&path, &name));
            entries.push((child, kind_of(file.as_ref()), name));
        }
        Ok(entries)
    }

    fn attr(&self, ino: u64, file: &dyn File) -> FileAttr {
        let size = file.size();
        let (kind, perm, nlink) = if file.is_dir() {
            (FileType::Directory, DIR_PERM, 2)
        } else {
            (FileType::RegularFile, FILE_PERM, 1)
        };

        FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: self.created_at,
            mtime: self.created_at,
            ctime: self.created_at,
            crtime: self.created_at,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }

    /// Read up to `size` bytes at `offset`, one cached block at a time
    fn read_range(&self, ino: u64, file: &dyn File, offset: u64, size: u32) -> io::Result<Vec<u8>> {
        let len = file.size();
        if offset >= len {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(size as u64).min(len);

        let mut out = Vec::with_capacity((end - offset) as usize);
        let mut pos = offset;
        while pos < end {
            let index = pos / BLOCK_SIZE;
            let block_start = index * BLOCK_SIZE;
            let block = self
                .cache
                .get_or_load(ino, index, || load_block(file, block_start, len))?;

            let from = (pos - block_start) as usize;
            if from >= block.len() {
                break;
            }
            let to = ((end - block_start) as usize).min(block.len());
            out.extend_from_slice(&block[from..to]);
            pos = block_start + to as u64;
        }
        Ok(out)
    }
}

/// Fill one block starting at `start`, stopping early at end of data
fn load_block(file: &dyn File, start: u64, len: u64) -> io::Result<Vec<u8>> {
    let want = BLOCK_SIZE.min(len - start) as usize;
    let mut block = vec![0; want];
    let mut filled = 0;
    while filled < want {
        let n = file.read_at(&mut block[filled..], start + filled as u64)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    block.truncate(filled);
    Ok(block)
}

fn kind_of(file: &dyn File) -> FileType {
    if file.is_dir() {
        FileType::Directory
    } else {
        FileType::RegularFile
    }
}

fn errno(err: &FsError) -> libc::c_int {
    match err {
        FsError::NotFound(_) => libc::ENOENT,
        FsError::NotADirectory(_) => libc::ENOTDIR,
        FsError::IsADirectory(_) => libc::EISDIR,
    }
}

fn io_errno(err: &io::Error) -> libc::c_int {
    err.raw_os_error().unwrap_or(libc::EIO)
}

impl fuser::Filesystem for TorrentFuse {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };

        match self.lookup_child(parent, name) {
            Ok((ino, file)) => {
                let attr = self.attr(ino, file.as_ref());
                reply.entry(&self.attr_ttl, &attr, 0);
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.file_of(ino) {
            Ok(file) => reply.attr(&self.attr_ttl, &self.attr(ino, file.as_ref())),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.file_of(ino) {
            Ok(file) if file.is_dir() => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.list_dir(ino) {
            Ok(entries) => entries,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };

        for (i, (child, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            // Buffer full
            if reply.add(child, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            reply.error(libc::EACCES);
            return;
        }
        match self.file_of(ino) {
            Ok(file) if file.is_dir() => reply.error(libc::EISDIR),
            Ok(_) => reply.opened(0, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let file = match self.file_of(ino) {
            Ok(file) if file.is_dir() => {
                reply.error(libc::EISDIR);
                return;
            }
            Ok(file) => file,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };

        match self.read_range(ino, file.as_ref(), offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(err) => {
                tracing::warn!(ino, offset, size, error = %err, "torrent read failed");
                reply.error(io_errno(&err));
            }
        }
    }

    fn destroy(&mut self) {
        self.cache.invalidate_all();
    }
}

impl std::fmt::Debug for TorrentFuse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorrentFuse")
            .field("inodes", &self.inodes.len())
            .field("cache", &self.cache)
            .field("attr_ttl", &self.attr_ttl)
            .finish()
    }
}
