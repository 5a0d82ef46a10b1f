//! Picks the `platform-*` implementation for the target OS.

use platform::HostPlatform;
use std::sync::Arc;

#[cfg(target_os = "linux")]
pub fn current_platform() -> Arc<dyn HostPlatform> {
    Arc::new(platform_linux::LinuxPlatform::new())
}

#[cfg(target_os = "macos")]
pub fn current_platform() -> Arc<dyn HostPlatform> {
    Arc::new(platform_macos::MacPlatform::new())
}

#[cfg(target_os = "windows")]
pub fn current_platform() -> Arc<dyn HostPlatform> {
    Arc::new(platform_windows::WindowsPlatform::new())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn current_platform() -> Arc<dyn HostPlatform> {
    Arc::new(platform::GenericPlatform)
}
