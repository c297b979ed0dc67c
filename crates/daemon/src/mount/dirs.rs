use std::fs::DirBuilder;
use std::io;
use std::path::{Path, PathBuf};

/// Default permissions for created mount directories
pub const DEFAULT_DIR_MODE: u32 = 0o744;

/// Directory that has to exist before `mount_point` can be attached.
///
/// FUSE on Unix mounts over an existing directory. WinFsp on Windows
/// requires the mount point itself to be absent, so only its parent is
/// prepared there.
pub fn mount_target(mount_point: &Path) -> PathBuf {
    if cfg!(windows) {
        match mount_point.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => mount_point.to_path_buf(),
        }
    } else {
        mount_point.to_path_buf()
    }
}

/// Create the directory a mount point needs, with any missing ancestors.
///
/// A directory that already exists is not an error. Returns the directory
/// that was prepared.
pub fn prepare_mount_dir(mount_point: &Path, mode: u32) -> io::Result<PathBuf> {
    let target = mount_target(mount_point);

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    match builder.create(&target) {
        Ok(()) => Ok(target),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(target),
        Err(err) => Err(err),
    }
}
