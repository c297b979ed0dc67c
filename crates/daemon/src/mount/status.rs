use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountStatus {
    /// Attach launched, host not yet serving
    Starting,
    /// Host is serving the filesystem
    Running,
    /// Attach returned cleanly (detached)
    Stopped,
    /// Attach failed
    Error,
}

impl MountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountStatus::Starting => "starting",
            MountStatus::Running => "running",
            MountStatus::Stopped => "stopped",
            MountStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for MountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reported when a background attach fails after `mount` has returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachFailure {
    pub path: PathBuf,
    pub error: String,
}

impl std::fmt::Display for AttachFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "error trying to mount filesystem at {}: {}",
            self.path.display(),
            self.error
        )
    }
}
