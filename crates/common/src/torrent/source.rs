use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a torrent comes from, as declared by a mount point
///
/// Exactly one of the fields is expected to be set. Empty strings count as
/// unset, so a config entry like `magnet_uri = ""` is rejected rather than
/// handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_path: Option<PathBuf>,
}

/// A validated [`TorrentSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind<'a> {
    Magnet(&'a str),
    File(&'a Path),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no magnet URI or torrent path provided")]
pub struct InvalidSource;

impl TorrentSource {
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self {
            magnet_uri: Some(uri.into()),
            torrent_path: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            magnet_uri: None,
            torrent_path: Some(path.into()),
        }
    }

    /// Classify the source. A magnet URI takes precedence over a file path.
    pub fn kind(&self) -> Result<SourceKind<'_>, InvalidSource> {
        if let Some(uri) = self.magnet_uri.as_deref().filter(|uri| !uri.is_empty()) {
            return Ok(SourceKind::Magnet(uri));
        }
        match self.torrent_path.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(SourceKind::File(path)),
            _ => Err(InvalidSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_source() {
        let source = TorrentSource::magnet("magnet:?xt=urn:btih:AAA");
        assert_eq!(
            source.kind(),
            Ok(SourceKind::Magnet("magnet:?xt=urn:btih:AAA"))
        );
    }

    #[test]
    fn test_file_source() {
        let source = TorrentSource::file("/data/a.torrent");
        assert_eq!(
            source.kind(),
            Ok(SourceKind::File(Path::new("/data/a.torrent")))
        );
    }

    #[test]
    fn test_magnet_wins_over_file() {
        let source = TorrentSource {
            magnet_uri: Some("magnet:?xt=urn:btih:BBB".to_string()),
            torrent_path: Some(PathBuf::from("/data/b.torrent")),
        };
        assert!(matches!(source.kind(), Ok(SourceKind::Magnet(_))));
    }

    #[test]
    fn test_empty_source_is_invalid() {
        assert_eq!(TorrentSource::default().kind(), Err(InvalidSource));

        let blank = TorrentSource {
            magnet_uri: Some(String::new()),
            torrent_path: Some(PathBuf::new()),
        };
        assert_eq!(blank.kind(), Err(InvalidSource));
    }
}
