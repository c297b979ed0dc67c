//! Mount lifecycle for torrent-backed filesystems
//!
//! Configured mount points are resolved through a [`TorrentClient`], composed
//! into a [`ContainerFs`](common::fs::ContainerFs) per path and projected onto
//! the host with FUSE (behind the `fuse` feature).
//!
//! [`TorrentClient`]: common::torrent::TorrentClient

pub mod config;
#[cfg(feature = "fuse")]
pub mod fuse;
pub mod logging;
pub mod mount;
pub mod process;

pub use config::{Config, ConfigError, FuseConfig, LogConfig, MountConfig, MountPoint};
pub use mount::{
    AttachFailure, MountError, MountEvent, MountHost, MountManager, MountManagerConfig,
    MountStatus, Projector,
};
pub use process::run;

#[cfg(feature = "fuse")]
pub use fuse::FuseProjector;
