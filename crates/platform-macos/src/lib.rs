//! macOS host identity, read through `sw_vers`.

use platform::{clean_version, HostPlatform, UNKNOWN_VERSION};
use std::process::Command;
use tracing::warn;

#[derive(Debug, Default, Clone, Copy)]
pub struct MacPlatform;

impl MacPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl HostPlatform for MacPlatform {
    fn name(&self) -> &'static str {
        "macOS"
    }

    fn os_version(&self) -> String {
        let output = Command::new("sw_vers").arg("-productVersion").output();
        let Ok(output) = output else {
            warn!("could not run sw_vers to query the macOS version");
            return UNKNOWN_VERSION.to_string();
        };
        if !output.status.success() {
            warn!("sw_vers exited with status {:?}", output.status.code());
            return UNKNOWN_VERSION.to_string();
        }

        clean_version(&String::from_utf8_lossy(&output.stdout))
    }
}
