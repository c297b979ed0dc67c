//! Registry of live mounts keyed by mount path

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use common::torrent::InfoHash;

use super::projection::MountHost;
use super::status::MountStatus;

/// A projection registered at a mount path
pub struct LiveMount {
    host: Arc<dyn MountHost>,
    /// Written by the supervising attach task
    status: Arc<Mutex<MountStatus>>,
    torrents: Vec<InfoHash>,
}

impl LiveMount {
    pub(crate) fn new(
        host: Arc<dyn MountHost>,
        status: Arc<Mutex<MountStatus>>,
        torrents: Vec<InfoHash>,
    ) -> Self {
        Self {
            host,
            status,
            torrents,
        }
    }

    pub fn host(&self) -> &Arc<dyn MountHost> {
        &self.host
    }

    pub fn status(&self) -> MountStatus {
        let status = *self.status.lock();
        if status == MountStatus::Starting && self.host.is_mounted() {
            MountStatus::Running
        } else {
            status
        }
    }

    /// Torrents feeding this mount, in declaration order
    pub fn torrents(&self) -> &[InfoHash] {
        &self.torrents
    }
}

impl std::fmt::Debug for LiveMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveMount")
            .field("status", &self.status())
            .field("torrents", &self.torrents)
            .finish()
    }
}

/// Mount path → live mount. A path is present from the moment its attach
/// is launched until the next global teardown.
///
/// A path can also be reserved while its mount is being prepared, which
/// keeps a second request for the same path out without registering it.
#[derive(Debug, Default)]
pub struct MountRegistry {
    mounts: BTreeMap<String, LiveMount>,
    reserved: BTreeSet<String>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for a mount in preparation. Fails if the path is
    /// mounted or already claimed.
    pub fn reserve(&mut self, path: &str) -> bool {
        if self.mounts.contains_key(path) || self.reserved.contains(path) {
            return false;
        }
        self.reserved.insert(path.to_string());
        true
    }

    /// Drop a claim that will not turn into a mount
    pub fn release(&mut self, path: &str) {
        self.reserved.remove(path);
    }

    pub fn is_reserved(&self, path: &str) -> bool {
        self.reserved.contains(path)
    }

    /// Register `mount` at `path`, consuming any claim on it. Refuses to
    /// replace an existing entry and hands the rejected mount back.
    pub fn insert(&mut self, path: &str, mount: LiveMount) -> Result<(), LiveMount> {
        if self.mounts.contains_key(path) {
            return Err(mount);
        }
        self.reserved.remove(path);
        self.mounts.insert(path.to_string(), mount);
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.mounts.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&LiveMount> {
        self.mounts.get(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.mounts.keys().cloned().collect()
    }

    /// Take every entry, leaving the registry empty. Claims on paths still
    /// being prepared are kept.
    pub fn drain(&mut self) -> BTreeMap<String, LiveMount> {
        std::mem::take(&mut self.mounts)
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Default)]
    struct StubHost {
        mounted: AtomicBool,
    }

    impl MountHost for StubHost {
        fn mount(&self, _mount_point: &Path) -> io::Result<()> {
            self.mounted.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn unmount(&self) -> io::Result<()> {
            self.mounted.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_mounted(&self) -> bool {
            self.mounted.load(Ordering::SeqCst)
        }
    }

    fn live_mount(host: Arc<StubHost>) -> LiveMount {
        LiveMount::new(
            host,
            Arc::new(Mutex::new(MountStatus::Starting)),
            vec![InfoHash::new([1; 20])],
        )
    }

    #[test]
    fn test_insert_rejects_duplicate_path() {
        let mut registry = MountRegistry::new();
        assert!(registry
            .insert("/mnt/a", live_mount(Arc::default()))
            .is_ok());
        assert!(registry
            .insert("/mnt/a", live_mount(Arc::default()))
            .is_err());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.paths(), vec!["/mnt/a"]);
    }

    #[test]
    fn test_reserve_blocks_second_claim() {
        let mut registry = MountRegistry::new();
        assert!(registry.reserve("/mnt/a"));
        assert!(!registry.reserve("/mnt/a"));
        assert!(registry.is_reserved("/mnt/a"));
        // A claim is not a mount
        assert!(!registry.contains("/mnt/a"));
        assert!(registry.is_empty());

        registry.release("/mnt/a");
        assert!(registry.reserve("/mnt/a"));
    }

    #[test]
    fn test_insert_consumes_claim() {
        let mut registry = MountRegistry::new();
        assert!(registry.reserve("/mnt/a"));
        registry.insert("/mnt/a", live_mount(Arc::default())).unwrap();

        assert!(!registry.is_reserved("/mnt/a"));
        assert!(!registry.reserve("/mnt/a"));

        registry.drain();
        assert!(registry.reserve("/mnt/a"));
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = MountRegistry::new();
        registry.insert("/mnt/a", live_mount(Arc::default())).unwrap();
        registry.insert("/mnt/b", live_mount(Arc::default())).unwrap();

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(!registry.contains("/mnt/a"));
    }

    #[test]
    fn test_status_reports_running_once_mounted() {
        let host = Arc::new(StubHost::default());
        let mount = live_mount(host.clone());
        assert_eq!(mount.status(), MountStatus::Starting);

        host.mount(Path::new("/mnt/a")).unwrap();
        assert_eq!(mount.status(), MountStatus::Running);
        assert_eq!(mount.torrents(), &[InfoHash::new([1; 20])]);
    }
}
