//! Windows host identity, parsed from the output of `ver`.

use platform::{HostPlatform, UNKNOWN_VERSION};
use std::process::Command;
use tracing::warn;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl HostPlatform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "Windows"
    }

    fn os_version(&self) -> String {
        let output = Command::new("cmd").args(["/C", "ver"]).output();
        let Ok(output) = output else {
            warn!("could not run `ver` to query the Windows version");
            return UNKNOWN_VERSION.to_string();
        };

        parse_ver_output(&String::from_utf8_lossy(&output.stdout)).unwrap_or_else(|| {
            warn!("unrecognized `ver` output");
            UNKNOWN_VERSION.to_string()
        })
    }
}

/// Pull `10.0.19045.3803` out of `Microsoft Windows [Version 10.0.19045.3803]`.
fn parse_ver_output(raw: &str) -> Option<String> {
    let start = raw.find('[')? + 1;
    let end = start + raw[start..].find(']')?;
    let inner = raw[start..end].trim();
    let version = inner.rsplit(' ').next()?.trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
