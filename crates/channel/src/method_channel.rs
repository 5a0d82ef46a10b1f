use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::call::MethodCall;
use crate::codec::{JsonMethodCodec, MethodCodec};
use crate::handler::MethodCallHandler;
use crate::messenger::BinaryMessenger;
use crate::result::{MethodError, MethodResult};
use crate::Result;

/// A named channel carrying method calls over a [`BinaryMessenger`].
#[derive(Clone)]
pub struct MethodChannel {
    name: String,
    messenger: Arc<BinaryMessenger>,
    codec: Arc<dyn MethodCodec>,
}

impl MethodChannel {
    pub fn new(messenger: Arc<BinaryMessenger>, name: impl Into<String>) -> Self {
        Self::with_codec(messenger, name, Arc::new(JsonMethodCodec))
    }

    pub fn with_codec(
        messenger: Arc<BinaryMessenger>,
        name: impl Into<String>,
        codec: Arc<dyn MethodCodec>,
    ) -> Self {
        Self {
            name: name.into(),
            messenger,
            codec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make `handler` the single handler for this channel, or detach with `None`.
    pub fn set_method_call_handler(&self, handler: Option<Arc<dyn MethodCallHandler>>) {
        let Some(handler) = handler else {
            self.messenger.set_message_handler(&self.name, None);
            return;
        };

        let codec = Arc::clone(&self.codec);
        let channel = self.name.clone();
        let on_message = move |message: &[u8]| -> Option<Vec<u8>> {
            let result = match codec.decode_method_call(message) {
                Ok(call) => {
                    debug!("channel '{}' received '{}'", channel, call.method());
                    handler.on_method_call(&call)
                }
                Err(e) => {
                    warn!("channel '{}' received a malformed call: {}", channel, e);
                    MethodResult::Error(MethodError::new("MALFORMED_CALL", e.to_string()))
                }
            };

            match codec.encode_result(&result) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("channel '{}' failed to encode reply: {}", channel, e);
                    let err = MethodError::new("ENCODING_FAILED", e.to_string());
                    codec.encode_error_envelope(&err).ok()
                }
            }
        };

        self.messenger
            .set_message_handler(&self.name, Some(Arc::new(on_message)));
    }

    /// Host side: invoke `method` and decode the reply. A missing reply is
    /// [`MethodResult::NotImplemented`].
    pub fn invoke_method(&self, method: &str, arguments: Value) -> Result<MethodResult> {
        let call = MethodCall::new(method, arguments);
        let message = self.codec.encode_method_call(&call)?;

        match self.messenger.send(&self.name, &message) {
            Some(reply) => self.codec.decode_envelope(&reply),
            None => Ok(MethodResult::NotImplemented),
        }
    }
}

impl std::fmt::Debug for MethodChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodChannel")
            .field("name", &self.name)
            .finish()
    }
}
