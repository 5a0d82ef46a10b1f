//! Linux host identity. The version is the running kernel release.

use platform::{clean_version, HostPlatform, UNKNOWN_VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";

#[derive(Debug, Clone)]
pub struct LinuxPlatform {
    release_path: PathBuf,
}

impl LinuxPlatform {
    pub fn new() -> Self {
        Self::with_release_path(OSRELEASE_PATH)
    }

    /// Read the release from another file. Used by tests and chroots.
    pub fn with_release_path(path: impl AsRef<Path>) -> Self {
        Self {
            release_path: path.as_ref().to_path_buf(),
        }
    }
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPlatform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "Linux"
    }

    fn os_version(&self) -> String {
        match fs::read_to_string(&self.release_path) {
            Ok(raw) => clean_version(&raw),
            Err(e) => {
                warn!(
                    "failed to read kernel release from {}: {}",
                    self.release_path.display(),
                    e
                );
                UNKNOWN_VERSION.to_string()
            }
        }
    }
}
