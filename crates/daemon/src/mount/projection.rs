//! Seam between the mount manager and the OS mount mechanism

use std::io;
use std::path::Path;
use std::sync::Arc;

use common::fs::ContainerFs;

/// A filesystem ready to be attached at a path
///
/// `mount` blocks for the lifetime of the attachment: it returns `Ok` once
/// the filesystem has been detached and an error if it could not be
/// attached or stopped serving abnormally. `unmount` may be called from any
/// thread while `mount` is blocked.
///
/// An `unmount` that arrives before `mount` has attached must still take
/// effect: it succeeds, and the pending `mount` returns `Ok` without serving.
pub trait MountHost: Send + Sync {
    fn mount(&self, mount_point: &Path) -> io::Result<()>;

    fn unmount(&self) -> io::Result<()>;

    /// Whether the filesystem is currently attached
    fn is_mounted(&self) -> bool;
}

/// Builds a [`MountHost`] for a composite filesystem
pub trait Projector: Send + Sync {
    fn project(&self, fs: Arc<ContainerFs>) -> Arc<dyn MountHost>;
}
