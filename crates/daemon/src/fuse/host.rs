//! FUSE-backed mount host

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fuser::{MountOption, Session, SessionUnmounter};
use parking_lot::Mutex;

use common::fs::ContainerFs;

use super::cache::{BlockCache, BlockCacheConfig};
use super::torrent_fuse::TorrentFuse;
use crate::config::FuseConfig;
use crate::mount::{MountHost, Projector};

const FS_NAME: &str = "tormount";

/// Where a host's single session is in its life
enum SessionState {
    /// Not attached yet
    Pending,
    /// Detach arrived before the attach; the attach must not serve
    DetachRequested,
    /// Session is serving and can be unmounted
    Attached(SessionUnmounter),
    /// Session ended or never came up
    Finished,
}

/// One FUSE session for one composite filesystem
///
/// The filesystem is handed to the session on attach, so a host can be
/// attached at most once. An `unmount` that arrives before the attach is
/// remembered and makes the attach return without serving.
pub struct FuseHost {
    fs: Mutex<Option<TorrentFuse>>,
    options: Vec<MountOption>,
    state: Mutex<SessionState>,
    mounted: AtomicBool,
}

impl FuseHost {
    pub fn new(fs: TorrentFuse, options: Vec<MountOption>) -> Self {
        Self {
            fs: Mutex::new(Some(fs)),
            options,
            state: Mutex::new(SessionState::Pending),
            mounted: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &[MountOption] {
        &self.options
    }
}

impl MountHost for FuseHost {
    fn mount(&self, mount_point: &Path) -> io::Result<()> {
        let fs = self.fs.lock().take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "filesystem was already attached")
        })?;

        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::DetachRequested) {
                *state = SessionState::Finished;
                tracing::info!(path = %mount_point.display(), "detached before attach, not mounting");
                return Ok(());
            }
        }

        let mut session = match Session::new(fs, mount_point, &self.options) {
            Ok(session) => session,
            Err(err) => {
                *self.state.lock() = SessionState::Finished;
                return Err(err);
            }
        };

        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::DetachRequested) {
                *state = SessionState::Finished;
                drop(state);
                tracing::info!(path = %mount_point.display(), "detach requested while attaching");
                return session.unmount_callable().unmount();
            }
            *state = SessionState::Attached(session.unmount_callable());
        }
        self.mounted.store(true, Ordering::SeqCst);
        tracing::info!(path = %mount_point.display(), "filesystem attached");

        // Serves requests until the kernel drops the connection
        let result = session.run();

        self.mounted.store(false, Ordering::SeqCst);
        *self.state.lock() = SessionState::Finished;
        result
    }

    fn unmount(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        match &mut *state {
            SessionState::Pending | SessionState::DetachRequested => {
                *state = SessionState::DetachRequested;
                Ok(())
            }
            SessionState::Attached(unmounter) => unmounter.unmount(),
            SessionState::Finished => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "filesystem is not mounted",
            )),
        }
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FuseHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseHost")
            .field("options", &self.options)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Builds a [`FuseHost`] per mount point from the daemon's FUSE settings
#[derive(Debug, Clone, Default)]
pub struct FuseProjector {
    config: FuseConfig,
}

impl FuseProjector {
    pub fn new(config: &FuseConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Projector for FuseProjector {
    fn project(&self, fs: Arc<ContainerFs>) -> Arc<dyn MountHost> {
        let fuse = TorrentFuse::new(
            fs,
            BlockCache::new(BlockCacheConfig::from(&self.config)),
            Duration::from_secs(self.config.attr_ttl_secs as u64),
        );
        Arc::new(FuseHost::new(fuse, mount_options(&self.config)))
    }
}

pub fn mount_options(config: &FuseConfig) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName(FS_NAME.to_string()),
        MountOption::Subtype(FS_NAME.to_string()),
        MountOption::DefaultPermissions,
    ];
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_host() -> Arc<dyn MountHost> {
        FuseProjector::new(&FuseConfig::default()).project(Arc::new(ContainerFs::new(vec![])))
    }

    #[test]
    fn test_mount_options() {
        let options = mount_options(&FuseConfig::default());
        assert!(options.contains(&MountOption::RO));
        assert!(options.contains(&MountOption::FSName("tormount".to_string())));
        assert!(!options.contains(&MountOption::AllowOther));

        let config = FuseConfig {
            allow_other: true,
            ..FuseConfig::default()
        };
        assert!(mount_options(&config).contains(&MountOption::AllowOther));
    }

    #[test]
    fn test_unmount_before_attach_cancels_attach() {
        let dir = tempfile::tempdir().unwrap();
        let host = empty_host();

        assert!(host.unmount().is_ok());
        // Repeated early detaches are harmless
        assert!(host.unmount().is_ok());

        // Returns without creating a session
        host.mount(dir.path()).unwrap();
        assert!(!host.is_mounted());

        let err = host.unmount().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_attach_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let host = empty_host();

        assert!(host.mount(&dir.path().join("missing")).is_err());
        assert!(!host.is_mounted());
        assert_eq!(
            host.unmount().unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );

        // The filesystem was consumed by the first attempt
        let err = host.mount(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }
}
