//! Plugin-to-host event streams.
//!
//! The host starts a stream with a `listen` call and ends it with `cancel`.
//! In between the plugin pushes events through an [`EventSink`]. Each event
//! is encoded as a success or error envelope, and an empty post marks the
//! end of the stream.

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec::{JsonMethodCodec, MethodCodec};
use crate::messenger::BinaryMessenger;
use crate::result::{MethodError, MethodResult};
use crate::Result;

/// Plugin side of an event channel.
pub trait StreamHandler: Send + Sync {
    fn on_listen(&self, arguments: &Value, sink: EventSink) -> std::result::Result<(), MethodError>;

    fn on_cancel(&self, arguments: &Value) -> std::result::Result<(), MethodError>;
}

/// What the host receives on a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Data(Value),
    Error(MethodError),
    EndOfStream,
}

/// Handle the plugin uses to push events to the host.
#[derive(Clone)]
pub struct EventSink {
    channel: String,
    messenger: Arc<BinaryMessenger>,
    codec: Arc<dyn MethodCodec>,
    ended: Arc<AtomicBool>,
}

impl EventSink {
    /// Send one event. Returns false if the stream already ended, nobody
    /// listens, or the value cannot be serialized.
    pub fn success<T: Serialize>(&self, event: T) -> bool {
        match serde_json::to_value(event) {
            Ok(value) => self.post_envelope(self.codec.encode_success_envelope(&value)),
            Err(e) => {
                warn!("event on '{}' is not serializable: {}", self.channel, e);
                false
            }
        }
    }

    pub fn error(&self, code: &str, message: &str, details: Value) -> bool {
        let err = MethodError::new(code, message).with_details(details);
        self.post_envelope(self.codec.encode_error_envelope(&err))
    }

    /// Close the stream. Later events are dropped.
    pub fn end_of_stream(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.messenger.post(&self.channel, None);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn post_envelope(&self, envelope: Result<Vec<u8>>) -> bool {
        if self.is_ended() {
            debug!("dropping event on ended stream '{}'", self.channel);
            return false;
        }
        match envelope {
            Ok(bytes) => self.messenger.post(&self.channel, Some(&bytes)),
            Err(e) => {
                warn!("failed to encode event on '{}': {}", self.channel, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("channel", &self.channel)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// A named event stream over a [`BinaryMessenger`].
#[derive(Clone)]
pub struct EventChannel {
    name: String,
    messenger: Arc<BinaryMessenger>,
    codec: Arc<dyn MethodCodec>,
}

impl EventChannel {
    pub fn new(messenger: Arc<BinaryMessenger>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messenger,
            codec: Arc::new(JsonMethodCodec),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make `handler` the single stream handler for this channel, or detach with `None`.
    pub fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>) {
        let Some(handler) = handler else {
            self.messenger.set_message_handler(&self.name, None);
            return;
        };

        let channel = self.name.clone();
        let messenger = Arc::clone(&self.messenger);
        let codec = Arc::clone(&self.codec);
        let on_message = move |message: &[u8]| -> Option<Vec<u8>> {
            let call = match codec.decode_method_call(message) {
                Ok(call) => call,
                Err(e) => {
                    warn!("event channel '{}' received a malformed call: {}", channel, e);
                    let err = MethodError::new("MALFORMED_CALL", e.to_string());
                    return codec.encode_error_envelope(&err).ok();
                }
            };

            let outcome = match call.method() {
                "listen" => {
                    let sink = EventSink {
                        channel: channel.clone(),
                        messenger: Arc::clone(&messenger),
                        codec: Arc::clone(&codec),
                        ended: Arc::new(AtomicBool::new(false)),
                    };
                    handler.on_listen(call.arguments(), sink)
                }
                "cancel" => handler.on_cancel(call.arguments()),
                _ => return None,
            };

            let result = match outcome {
                Ok(()) => MethodResult::done(),
                Err(err) => MethodResult::Error(err),
            };
            codec.encode_result(&result).ok().flatten()
        };

        self.messenger
            .set_message_handler(&self.name, Some(Arc::new(on_message)));
    }

    /// Host side: subscribe `listener` and send `listen`.
    pub fn receive_stream<F>(&self, arguments: Value, listener: F) -> Result<MethodResult>
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        let codec = Arc::clone(&self.codec);
        let channel = self.name.clone();
        self.messenger.set_event_listener(
            &self.name,
            Some(Arc::new(move |message: Option<&[u8]>| {
                let Some(bytes) = message else {
                    listener(StreamEvent::EndOfStream);
                    return;
                };
                match codec.decode_envelope(bytes) {
                    Ok(MethodResult::Success(value)) => listener(StreamEvent::Data(value)),
                    Ok(MethodResult::Error(err)) => listener(StreamEvent::Error(err)),
                    Ok(MethodResult::NotImplemented) => {}
                    Err(e) => warn!("undecodable event on '{}': {}", channel, e),
                }
            })),
        );

        let result = self.send_control("listen", arguments);
        if !matches!(result, Ok(MethodResult::Success(_))) {
            self.messenger.set_event_listener(&self.name, None);
        }
        result
    }

    /// Host side: send `cancel` and drop the listener.
    pub fn cancel_stream(&self, arguments: Value) -> Result<MethodResult> {
        let result = self.send_control("cancel", arguments);
        self.messenger.set_event_listener(&self.name, None);
        result
    }

    fn send_control(&self, method: &str, arguments: Value) -> Result<MethodResult> {
        let call = crate::call::MethodCall::new(method, arguments);
        let message = self.codec.encode_method_call(&call)?;
        match self.messenger.send(&self.name, &message) {
            Some(reply) => self.codec.decode_envelope(&reply),
            None => Ok(MethodResult::NotImplemented),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Emits the listen arguments back, then ends the stream.
    #[derive(Default)]
    struct EchoStream {
        cancelled: AtomicBool,
        sink: Mutex<Option<EventSink>>,
    }

    impl StreamHandler for EchoStream {
        fn on_listen(&self, arguments: &Value, sink: EventSink) -> std::result::Result<(), MethodError> {
            if arguments.get("reject").is_some() {
                return Err(MethodError::new("REJECTED", "listen refused"));
            }
            sink.success(arguments);
            sink.error("WARN", "heads up", json!(1));
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn on_cancel(&self, _arguments: &Value) -> std::result::Result<(), MethodError> {
            self.cancelled.store(true, Ordering::SeqCst);
            if let Some(sink) = self.sink.lock().unwrap().take() {
                sink.end_of_stream();
                sink.end_of_stream();
                assert!(!sink.success("late"));
            }
            Ok(())
        }
    }

    fn collect() -> (Arc<Mutex<Vec<StreamEvent>>>, impl Fn(StreamEvent) + Send + Sync) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event: StreamEvent| sink.lock().unwrap().push(event))
    }

    #[test]
    fn listen_then_cancel_delivers_events_in_order() {
        let channel = EventChannel::new(Arc::new(BinaryMessenger::new()), "test/events");
        let handler = Arc::new(EchoStream::default());
        channel.set_stream_handler(Some(handler.clone()));

        let (events, listener) = collect();
        assert_eq!(
            channel.receive_stream(json!({"n": 1}), listener).unwrap(),
            MethodResult::done()
        );
        assert_eq!(channel.cancel_stream(Value::Null).unwrap(), MethodResult::done());
        assert!(handler.cancelled.load(Ordering::SeqCst));

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StreamEvent::Data(json!({"n": 1})),
                StreamEvent::Error(MethodError::new("WARN", "heads up").with_details(json!(1))),
                StreamEvent::EndOfStream,
            ]
        );
    }

    #[test]
    fn listener_may_cancel_while_an_event_is_delivered() {
        let messenger = Arc::new(BinaryMessenger::new());
        let channel = EventChannel::new(Arc::clone(&messenger), "test/events");
        let handler = Arc::new(EchoStream::default());
        channel.set_stream_handler(Some(handler.clone()));

        let events = Arc::new(Mutex::new(Vec::new()));
        let cancel_results = Arc::new(Mutex::new(Vec::new()));
        let listener = {
            let events = Arc::clone(&events);
            let cancel_results = Arc::clone(&cancel_results);
            let channel = channel.clone();
            move |event: StreamEvent| {
                events.lock().unwrap().push(event);
                let result = channel.cancel_stream(Value::Null).unwrap();
                cancel_results.lock().unwrap().push(result);
            }
        };

        assert_eq!(
            channel.receive_stream(json!({"n": 1}), listener).unwrap(),
            MethodResult::done()
        );
        assert!(handler.cancelled.load(Ordering::SeqCst));
        assert_eq!(*cancel_results.lock().unwrap(), vec![MethodResult::done()]);
        // The error sent after the cancel found nobody listening.
        assert_eq!(*events.lock().unwrap(), vec![StreamEvent::Data(json!({"n": 1}))]);
        assert!(!messenger.post("test/events", Some(b"[1]")));
    }

    #[test]
    fn rejected_listen_is_an_error_and_unsubscribes() {
        let messenger = Arc::new(BinaryMessenger::new());
        let channel = EventChannel::new(Arc::clone(&messenger), "test/events");
        channel.set_stream_handler(Some(Arc::new(EchoStream::default())));

        let (_events, listener) = collect();
        let result = channel.receive_stream(json!({"reject": true}), listener).unwrap();
        assert_eq!(result, MethodResult::error("REJECTED", "listen refused"));
        assert!(!messenger.post("test/events", Some(b"[1]")));
    }

    #[test]
    fn unknown_control_method_is_not_implemented() {
        let messenger = Arc::new(BinaryMessenger::new());
        let channel = EventChannel::new(Arc::clone(&messenger), "test/events");
        channel.set_stream_handler(Some(Arc::new(EchoStream::default())));
        assert_eq!(
            messenger.send("test/events", br#"{"method":"pause"}"#),
            None
        );
    }
}
