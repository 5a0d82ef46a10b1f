// Platform abstraction crate. No OS checks here; platform specifics live in the `platform-*` crates.

/// Version string reported when the host refuses to tell us.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Identity of the operating system the plugin is running on.
pub trait HostPlatform: Send + Sync {
    /// Fixed literal naming the host OS, e.g. `"Linux"`.
    fn name(&self) -> &'static str;

    /// Current OS version. Read on every call, never cached.
    fn os_version(&self) -> String;

    /// `"<name> <version>"`, the string answered to `getPlatformVersion`.
    fn describe(&self) -> String {
        format!("{} {}", self.name(), self.os_version())
    }
}

// Minimal placeholder for targets without a `platform-*` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericPlatform;

impl HostPlatform for GenericPlatform {
    fn name(&self) -> &'static str {
        "generic-platform"
    }

    fn os_version(&self) -> String {
        UNKNOWN_VERSION.to_string()
    }
}

/// Platform with a caller-supplied identity. Embedders that already know the
/// host version (and tests) use this.
#[derive(Debug, Clone)]
pub struct FixedPlatform {
    name: &'static str,
    version: String,
}

impl FixedPlatform {
    pub fn new(name: &'static str, version: impl Into<String>) -> Self {
        Self {
            name,
            version: version.into(),
        }
    }
}

impl HostPlatform for FixedPlatform {
    fn name(&self) -> &'static str {
        self.name
    }

    fn os_version(&self) -> String {
        self.version.clone()
    }
}

/// Normalize raw version output: trim it, and fall back to
/// [`UNKNOWN_VERSION`] when nothing is left.
pub fn clean_version(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNKNOWN_VERSION.to_string()
    } else {
        trimmed.to_string()
    }
}
