//! Progress events emitted while a mount point is being set up
//!
//! Events are purely observational. The `Display` form is the
//! human-readable progress line shown to users.

use common::torrent::InfoHash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEvent {
    /// Waiting for a torrent's metadata before it can be shown
    GettingInfo { info_hash: InfoHash },

    /// A torrent has been attached to a mount point's filesystem
    TorrentAdded { name: String, path: String },
}

/// Callback receiving [`MountEvent`]s
pub type EventFn = dyn Fn(&MountEvent) + Send + Sync;

/// Callback that drops every event
pub fn ignore_events(_: &MountEvent) {}

impl std::fmt::Display for MountEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountEvent::GettingInfo { info_hash } => {
                write!(f, "getting torrent info...: {}", info_hash)
            }
            MountEvent::TorrentAdded { name, .. } => {
                write!(f, "torrent {} added to mountpoint", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let hash = InfoHash::new([0xaa; 20]);
        assert_eq!(
            MountEvent::GettingInfo { info_hash: hash }.to_string(),
            format!("getting torrent info...: {}", "aa".repeat(20))
        );
        assert_eq!(
            MountEvent::TorrentAdded {
                name: "AAA-data".to_string(),
                path: "/mnt/a".to_string(),
            }
            .to_string(),
            "torrent AAA-data added to mountpoint"
        );
    }
}
