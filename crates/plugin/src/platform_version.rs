//! Call Responder for the version channel.

use channel::{MethodCall, MethodCallHandler, MethodResult, MethodTable};
use platform::HostPlatform;
use std::sync::Arc;

pub const GET_PLATFORM_VERSION: &str = "getPlatformVersion";

/// Answers `getPlatformVersion` with `"<platform> <version>"`. Every other
/// method is not implemented.
///
/// Holds no state besides the platform, so it is safe to share across
/// threads and to register more than once.
#[derive(Debug)]
pub struct PlatformVersionResponder {
    methods: MethodTable,
}

impl PlatformVersionResponder {
    pub fn new(platform: Arc<dyn HostPlatform>) -> Self {
        let methods = MethodTable::new().with(GET_PLATFORM_VERSION, move |_| {
            MethodResult::success(platform.describe())
        });
        Self { methods }
    }

    pub fn handle(&self, call: &MethodCall) -> MethodResult {
        self.methods.on_method_call(call)
    }
}

impl MethodCallHandler for PlatformVersionResponder {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult {
        self.handle(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::FixedPlatform;
    use serde_json::json;
    use std::sync::Mutex;

    /// Platform whose version can be bumped mid-test.
    struct UpgradingPlatform(Mutex<String>);

    impl HostPlatform for UpgradingPlatform {
        fn name(&self) -> &'static str {
            "iOS"
        }

        fn os_version(&self) -> String {
            self.0.lock().unwrap().clone()
        }
    }

    fn responder() -> PlatformVersionResponder {
        PlatformVersionResponder::new(Arc::new(FixedPlatform::new("iOS", "17.4")))
    }

    #[test]
    fn answers_platform_version() {
        let result = responder().handle(&MethodCall::new(GET_PLATFORM_VERSION, json!(null)));
        assert_eq!(result.as_str(), Some("iOS 17.4"));
    }

    #[test]
    fn other_methods_are_not_implemented() {
        let responder = responder();
        for method in [
            "",
            "doSomethingElse",
            "getplatformversion",
            "getPlatformVersion ",
            "getPlatformVersio",
            "получитьВерсию",
            "🎵",
        ] {
            let result = responder.handle(&MethodCall::new(method, json!({"x": 1})));
            assert!(result.is_not_implemented(), "{method:?} got {result:?}");
        }
    }

    #[test]
    fn repeated_calls_classify_the_same() {
        let responder = responder();
        let call = MethodCall::bare(GET_PLATFORM_VERSION);
        assert_eq!(responder.handle(&call), responder.handle(&call));

        let miss = MethodCall::bare("stop");
        assert!(responder.handle(&miss).is_not_implemented());
        assert!(responder.handle(&miss).is_not_implemented());
    }

    #[test]
    fn version_is_read_at_call_time() {
        let platform = Arc::new(UpgradingPlatform(Mutex::new("17.4".to_string())));
        let responder = PlatformVersionResponder::new(platform.clone());
        let call = MethodCall::bare(GET_PLATFORM_VERSION);

        assert_eq!(responder.handle(&call).as_str(), Some("iOS 17.4"));
        *platform.0.lock().unwrap() = "17.5".to_string();
        assert_eq!(responder.handle(&call).as_str(), Some("iOS 17.5"));
    }

    #[test]
    fn arguments_are_ignored() {
        let responder = responder();
        let with_args = MethodCall::new(GET_PLATFORM_VERSION, json!({"x": [1, 2, 3]}));
        assert_eq!(responder.handle(&with_args).as_str(), Some("iOS 17.4"));
    }
}
