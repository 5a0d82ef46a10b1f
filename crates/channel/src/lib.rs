//! Host messaging channel model.
//! Named channels on a [`BinaryMessenger`], method calls encoded with a
//! [`MethodCodec`], and handlers dispatched by method name.

use thiserror::Error;

pub mod call;
pub mod codec;
pub mod event_channel;
pub mod handler;
pub mod messenger;
pub mod method_channel;
pub mod result;

pub use call::MethodCall;
pub use codec::{JsonMethodCodec, MethodCodec};
pub use event_channel::{EventChannel, EventSink, StreamEvent, StreamHandler};
pub use handler::{MethodCallHandler, MethodTable};
pub use messenger::{BinaryMessenger, EventListener, MessageHandler};
pub use method_channel::MethodChannel;
pub use result::{MethodError, MethodResult};

/// Channel-level errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("JSON codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Malformed method call: {0}")]
    MalformedCall(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
