//! Mount point lifecycle
//!
//! - `MountManager`: turns mount points into attached filesystems and tears
//!   them all down again
//! - `MountRegistry`: which paths are mounted, and by what
//! - `MountHost` / `Projector`: the seam to the OS mount mechanism (FUSE
//!   lives in [`crate::fuse`])

mod dirs;
mod events;
mod manager;
mod projection;
mod registry;
mod status;

pub use dirs::{mount_target, prepare_mount_dir, DEFAULT_DIR_MODE};
pub use events::{ignore_events, EventFn, MountEvent};
pub use manager::{MountError, MountManager, MountManagerConfig};
pub use projection::{MountHost, Projector};
pub use registry::{LiveMount, MountRegistry};
pub use status::{AttachFailure, MountStatus};
