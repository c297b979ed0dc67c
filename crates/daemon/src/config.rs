//! Daemon configuration, loaded from TOML
//!
//! ```toml
//! [log]
//! level = "info"
//! directory = "/var/log/tormount"
//!
//! [fuse]
//! allow_other = false
//! cache_size_mb = 64
//!
//! [mount]
//! metadata_timeout_secs = 300
//!
//! [[mount_points]]
//! path = "/mnt/torrents/linux"
//!
//! [[mount_points.torrents]]
//! magnet_uri = "magnet:?xt=urn:btih:..."
//!
//! [[mount_points.torrents]]
//! torrent_path = "/srv/torrents/debian.torrent"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::torrent::TorrentSource;

use crate::mount::{MountManagerConfig, DEFAULT_DIR_MODE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub fuse: FuseConfig,
    pub mount: MountConfig,
    pub mount_points: Vec<MountPoint>,
}

/// A path and the torrents to show under it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub path: String,
    #[serde(default)]
    pub torrents: Vec<TorrentSource>,
}

impl MountPoint {
    pub fn new(path: impl Into<String>, torrents: Vec<TorrentSource>) -> Self {
        Self {
            path: path.into(),
            torrents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub level: String,
    /// Write a daily-rolling log file here in addition to stdout
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    /// Let users other than the mounting one read the filesystem
    pub allow_other: bool,
    /// Read block cache size in megabytes
    pub cache_size_mb: u32,
    /// Seconds a cached block stays valid
    pub cache_ttl_secs: u32,
    /// Seconds the kernel may cache attributes and lookups
    pub attr_ttl_secs: u32,
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self {
            allow_other: false,
            cache_size_mb: 64,
            cache_ttl_secs: 300,
            attr_ttl_secs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Give up on a torrent whose metadata has not arrived after this long.
    /// Unset waits forever.
    pub metadata_timeout_secs: Option<u64>,
    /// Permissions for created mount directories
    pub dir_mode: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: None,
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

impl From<&MountConfig> for MountManagerConfig {
    fn from(config: &MountConfig) -> Self {
        Self {
            metadata_timeout: config.metadata_timeout_secs.map(Duration::from_secs),
            dir_mode: config.dir_mode,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("mount point {0} has an empty path")]
    EmptyMountPath(usize),
    #[error("mount point path declared twice: {0}")]
    DuplicateMountPoint(String),
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject mount points that could never be registered
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, mount_point) in self.mount_points.iter().enumerate() {
            if mount_point.path.trim().is_empty() {
                return Err(ConfigError::EmptyMountPath(index));
            }
            if !seen.insert(mount_point.path.as_str()) {
                return Err(ConfigError::DuplicateMountPoint(mount_point.path.clone()));
            }
        }
        Ok(())
    }

    pub fn manager_config(&self) -> MountManagerConfig {
        MountManagerConfig::from(&self.mount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log.level, "info");
        assert_eq!(config.fuse.cache_size_mb, 64);
        assert_eq!(config.mount.dir_mode, 0o744);
        assert!(config.mount_points.is_empty());
        assert!(config.manager_config().metadata_timeout.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [log]
            level = "debug"
            directory = "/tmp/tormount-logs"

            [fuse]
            allow_other = true

            [mount]
            metadata_timeout_secs = 30

            [[mount_points]]
            path = "/mnt/a"

            [[mount_points.torrents]]
            magnet_uri = "magnet:?xt=urn:btih:AAA"

            [[mount_points.torrents]]
            torrent_path = "/srv/b.torrent"

            [[mount_points]]
            path = "/mnt/empty"
            "#,
        )
        .unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(
            config.log.directory.as_deref(),
            Some(Path::new("/tmp/tormount-logs"))
        );
        assert!(config.fuse.allow_other);
        assert_eq!(config.fuse.attr_ttl_secs, 1);
        assert_eq!(
            config.manager_config().metadata_timeout,
            Some(Duration::from_secs(30))
        );

        assert_eq!(config.mount_points.len(), 2);
        let a = &config.mount_points[0];
        assert_eq!(a.path, "/mnt/a");
        assert_eq!(
            a.torrents,
            vec![
                TorrentSource::magnet("magnet:?xt=urn:btih:AAA"),
                TorrentSource::file("/srv/b.torrent"),
            ]
        );
        assert!(config.mount_points[1].torrents.is_empty());
    }

    #[test]
    fn test_source_without_fields_parses() {
        // Rejected at mount time, not at load time
        let config = Config::from_toml_str(
            r#"
            [[mount_points]]
            path = "/mnt/a"
            torrents = [{}]
            "#,
        )
        .unwrap();
        assert!(config.mount_points[0].torrents[0].kind().is_err());
    }

    #[test]
    fn test_duplicate_mount_point() {
        let err = Config::from_toml_str(
            r#"
            [[mount_points]]
            path = "/mnt/a"

            [[mount_points]]
            path = "/mnt/a"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMountPoint(path) if path == "/mnt/a"));
    }

    #[test]
    fn test_empty_mount_path() {
        let err = Config::from_toml_str(
            r#"
            [[mount_points]]
            path = " "
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyMountPath(0)));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[log\nlevel = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
