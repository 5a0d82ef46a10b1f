//! Attaching the plugin's channels to a host messenger.

use channel::{BinaryMessenger, EventChannel, MethodChannel};
use platform::HostPlatform;
use std::sync::Arc;
use tracing::info;

use crate::host::current_platform;
use crate::pitch_channel::{default_source_factory, PitchDetectionPlugin, SourceFactory};
use crate::platform_version::PlatformVersionResponder;
use crate::settings::PluginSettings;

/// Collects what the plugin needs before it is attached.
pub struct PluginBuilder {
    settings: PluginSettings,
    platform: Option<Arc<dyn HostPlatform>>,
    source_factory: Option<SourceFactory>,
}

impl PluginBuilder {
    pub fn new(settings: PluginSettings) -> Self {
        Self {
            settings,
            platform: None,
            source_factory: None,
        }
    }

    /// Override the host platform (defaults to the one for this target).
    pub fn platform(mut self, platform: Arc<dyn HostPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Override where `start` gets its audio (defaults to the microphone).
    pub fn source_factory(mut self, factory: SourceFactory) -> Self {
        self.source_factory = Some(factory);
        self
    }

    /// Register every channel on `messenger`. Attaching a second plugin to
    /// the same messenger replaces the first one's handlers.
    pub fn attach(self, messenger: Arc<BinaryMessenger>) -> PluginBinding {
        let platform = self.platform.unwrap_or_else(current_platform);
        let source_factory = self.source_factory.unwrap_or_else(default_source_factory);

        let version_channel =
            MethodChannel::new(Arc::clone(&messenger), self.settings.version_channel.clone());
        let method_channel =
            MethodChannel::new(Arc::clone(&messenger), self.settings.method_channel.clone());
        let event_channel =
            EventChannel::new(Arc::clone(&messenger), self.settings.event_channel.clone());

        let responder = Arc::new(PlatformVersionResponder::new(platform));
        version_channel.set_method_call_handler(Some(responder));

        let pitch = Arc::new(PitchDetectionPlugin::new(self.settings, source_factory));
        method_channel.set_method_call_handler(Some(pitch.clone()));
        event_channel.set_stream_handler(Some(pitch.clone()));

        info!(
            "plugin attached on '{}', '{}', '{}'",
            version_channel.name(),
            method_channel.name(),
            event_channel.name()
        );

        PluginBinding {
            version_channel,
            method_channel,
            event_channel,
            pitch,
        }
    }
}

/// Live registration. Call [`PluginBinding::detach`] to unregister.
///
/// The stored event sink points back at the messenger, which owns the
/// plugin's handlers. Dropping the binding clears that sink and stops
/// detection even without `detach`; the handlers stay registered.
pub struct PluginBinding {
    version_channel: MethodChannel,
    method_channel: MethodChannel,
    event_channel: EventChannel,
    pitch: Arc<PitchDetectionPlugin>,
}

impl PluginBinding {
    pub fn pitch(&self) -> &Arc<PitchDetectionPlugin> {
        &self.pitch
    }

    pub fn version_channel(&self) -> &MethodChannel {
        &self.version_channel
    }

    pub fn method_channel(&self) -> &MethodChannel {
        &self.method_channel
    }

    pub fn event_channel(&self) -> &EventChannel {
        &self.event_channel
    }

    /// Remove all handlers and stop any running detection.
    pub fn detach(self) {
        self.version_channel.set_method_call_handler(None);
        self.method_channel.set_method_call_handler(None);
        self.event_channel.set_stream_handler(None);
        info!("plugin detached");
    }
}

impl Drop for PluginBinding {
    fn drop(&mut self) {
        self.pitch.release();
    }
}
