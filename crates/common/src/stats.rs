//! Torrent statistics grouped by mount route
//!
//! The mount manager registers every torrent it mounts under the mount
//! path ("route") it belongs to, and tells the sink to forget everything on
//! a global unmount. Readers take snapshots; nothing here holds a lock
//! across engine calls longer than one snapshot.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::torrent::{InfoHash, Torrent};

pub trait StatsSink: Send + Sync {
    /// Track `torrent` under `route`
    fn add(&self, route: &str, torrent: Torrent);

    /// Forget every tracked torrent
    fn remove_all(&self);
}

/// Snapshot of one torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentStat {
    pub name: String,
    pub info_hash: InfoHash,
    pub active_peers: u32,
    pub total_peers: u32,
    pub bytes_downloaded: u64,
    pub bytes_uploaded: u64,
}

/// Snapshot of every torrent under one route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStats {
    pub route: String,
    pub torrents: Vec<TorrentStat>,
}

/// Totals across all routes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub torrents: usize,
    pub bytes_downloaded: u64,
    pub bytes_uploaded: u64,
}

/// In-memory [`StatsSink`]
#[derive(Default)]
pub struct TorrentStats {
    routes: RwLock<BTreeMap<String, Vec<Torrent>>>,
}

impl TorrentStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-route snapshots, routes in lexical order, torrents in insertion order
    pub fn routes(&self) -> Vec<RouteStats> {
        self.routes
            .read()
            .iter()
            .map(|(route, torrents)| RouteStats {
                route: route.clone(),
                torrents: torrents.iter().map(snapshot).collect(),
            })
            .collect()
    }

    /// Snapshot of the first tracked torrent with `info_hash`
    pub fn torrent(&self, info_hash: &InfoHash) -> Option<TorrentStat> {
        self.routes
            .read()
            .values()
            .flatten()
            .find(|torrent| torrent.info_hash() == *info_hash)
            .map(snapshot)
    }

    pub fn global(&self) -> GlobalStats {
        self.routes
            .read()
            .values()
            .flatten()
            .fold(GlobalStats::default(), |mut acc, torrent| {
                let swarm = torrent.swarm_stats();
                acc.torrents += 1;
                acc.bytes_downloaded += swarm.bytes_downloaded;
                acc.bytes_uploaded += swarm.bytes_uploaded;
                acc
            })
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl StatsSink for TorrentStats {
    fn add(&self, route: &str, torrent: Torrent) {
        tracing::debug!(route = %route, hash = %torrent.info_hash(), "tracking torrent");
        self.routes
            .write()
            .entry(route.to_string())
            .or_default()
            .push(torrent);
    }

    fn remove_all(&self) {
        self.routes.write().clear();
    }
}

impl std::fmt::Debug for TorrentStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.routes.read();
        f.debug_struct("TorrentStats")
            .field("routes", &routes.keys().collect::<Vec<_>>())
            .field("torrents", &routes.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

fn snapshot(torrent: &Torrent) -> TorrentStat {
    let swarm = torrent.swarm_stats();
    TorrentStat {
        name: torrent.known_name().unwrap_or_default(),
        info_hash: torrent.info_hash(),
        active_peers: swarm.active_peers,
        total_peers: swarm.total_peers,
        bytes_downloaded: swarm.bytes_downloaded,
        bytes_uploaded: swarm.bytes_uploaded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockTorrent;
    use crate::torrent::SwarmStats;

    #[test]
    fn test_add_groups_by_route() {
        let stats = TorrentStats::new();
        stats.add("/mnt/b", MockTorrent::new(2, "two"));
        stats.add("/mnt/a", MockTorrent::new(1, "one"));
        stats.add("/mnt/a", MockTorrent::new(3, "three"));

        let routes = stats.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].route, "/mnt/a");
        let names: Vec<_> = routes[0].torrents.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["one", "three"]);
        assert_eq!(routes[1].torrents[0].name, "two");
    }

    #[test]
    fn test_torrent_lookup_and_global() {
        let stats = TorrentStats::new();
        let torrent = MockTorrent::new(9, "nine");
        torrent.set_swarm_stats(SwarmStats {
            active_peers: 2,
            total_peers: 5,
            bytes_downloaded: 1024,
            bytes_uploaded: 10,
        });
        stats.add("/mnt/n", torrent);
        stats.add("/mnt/m", MockTorrent::new(8, "eight"));

        let stat = stats.torrent(&InfoHash::new([9; 20])).unwrap();
        assert_eq!(stat.name, "nine");
        assert_eq!(stat.total_peers, 5);
        assert!(stats.torrent(&InfoHash::new([0; 20])).is_none());

        let global = stats.global();
        assert_eq!(global.torrents, 2);
        assert_eq!(global.bytes_downloaded, 1024);
        assert_eq!(global.bytes_uploaded, 10);
    }

    #[test]
    fn test_remove_all() {
        let stats = TorrentStats::new();
        stats.add("/mnt/a", MockTorrent::new(1, "one"));
        assert!(!stats.is_empty());

        stats.remove_all();
        assert!(stats.is_empty());
        assert!(stats.routes().is_empty());
        assert_eq!(stats.global(), GlobalStats::default());

        // Clearing twice is fine
        stats.remove_all();
        assert!(stats.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = TorrentStats::new();
        stats.add("/mnt/a", MockTorrent::new(1, "one"));
        let json = serde_json::to_value(stats.routes()).unwrap();
        assert_eq!(json[0]["route"], "/mnt/a");
        assert_eq!(json[0]["torrents"][0]["info_hash"], "01".repeat(20));
    }
}
