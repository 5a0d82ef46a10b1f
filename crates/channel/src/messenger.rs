use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Handles a raw message sent to a channel. `None` means "no reply".
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: &[u8]) -> Option<Vec<u8>>;
}

impl<F> MessageHandler for F
where
    F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync,
{
    fn on_message(&self, message: &[u8]) -> Option<Vec<u8>> {
        self(message)
    }
}

/// Host-side consumer of messages posted by a plugin. `None` marks the end
/// of the stream.
pub type EventListener = Arc<dyn Fn(Option<&[u8]>) + Send + Sync>;

/// Routes messages between the host and plugin handlers by channel name.
///
/// Each channel has at most one handler. Installing a second one replaces
/// the first (last registration wins).
#[derive(Default)]
pub struct BinaryMessenger {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    listeners: RwLock<HashMap<String, EventListener>>,
}

impl BinaryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (`Some`) or remove (`None`) the handler for `channel`.
    pub fn set_message_handler(&self, channel: &str, handler: Option<Arc<dyn MessageHandler>>) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match handler {
            Some(handler) => {
                if handlers.insert(channel.to_string(), handler).is_some() {
                    debug!("replaced message handler on channel '{}'", channel);
                } else {
                    debug!("registered message handler on channel '{}'", channel);
                }
            }
            None => {
                if handlers.remove(channel).is_some() {
                    debug!("removed message handler from channel '{}'", channel);
                }
            }
        }
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(channel)
    }

    /// Deliver a host message to the channel's handler and return its reply.
    pub fn send(&self, channel: &str, message: &[u8]) -> Option<Vec<u8>> {
        // Clone out of the lock so the handler may re-enter the messenger.
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned();

        match handler {
            Some(handler) => handler.on_message(message),
            None => {
                debug!("no handler on channel '{}', message dropped", channel);
                None
            }
        }
    }

    /// Install (`Some`) or remove (`None`) the host listener for `channel`.
    pub fn set_event_listener(&self, channel: &str, listener: Option<EventListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match listener {
            Some(listener) => {
                listeners.insert(channel.to_string(), listener);
            }
            None => {
                listeners.remove(channel);
            }
        }
    }

    /// Post a plugin message to the host. Returns false when nobody listens.
    pub fn post(&self, channel: &str, message: Option<&[u8]>) -> bool {
        let listener = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned();

        match listener {
            Some(listener) => {
                listener(message);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for BinaryMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut channels: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        channels.sort();
        f.debug_struct("BinaryMessenger")
            .field("channels", &channels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn reply_with(tag: &'static [u8]) -> Arc<dyn MessageHandler> {
        Arc::new(move |_: &[u8]| Some(tag.to_vec()))
    }

    #[test]
    fn send_without_handler_has_no_reply() {
        let messenger = BinaryMessenger::new();
        assert_eq!(messenger.send("missing", b"hi"), None);
        assert!(!messenger.has_handler("missing"));
    }

    #[test]
    fn last_registration_wins() {
        let messenger = BinaryMessenger::new();
        messenger.set_message_handler("chan", Some(reply_with(b"first")));
        messenger.set_message_handler("chan", Some(reply_with(b"second")));
        assert_eq!(messenger.send("chan", b""), Some(b"second".to_vec()));

        messenger.set_message_handler("chan", None);
        assert_eq!(messenger.send("chan", b""), None);
    }

    #[test]
    fn handler_may_reenter_messenger() {
        let messenger = Arc::new(BinaryMessenger::new());
        messenger.set_message_handler("inner", Some(reply_with(b"inner")));
        let outer = {
            let messenger = Arc::clone(&messenger);
            move |msg: &[u8]| messenger.send("inner", msg)
        };
        messenger.set_message_handler("outer", Some(Arc::new(outer)));
        assert_eq!(messenger.send("outer", b""), Some(b"inner".to_vec()));
    }

    #[test]
    fn post_reaches_listener_until_removed() {
        let messenger = BinaryMessenger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        messenger.set_event_listener(
            "events",
            Some(Arc::new(move |msg: Option<&[u8]>| {
                sink.lock().unwrap().push(msg.map(<[u8]>::to_vec));
            })),
        );

        assert!(messenger.post("events", Some(b"one")));
        assert!(messenger.post("events", None));
        messenger.set_event_listener("events", None);
        assert!(!messenger.post("events", Some(b"lost")));

        assert_eq!(*seen.lock().unwrap(), vec![Some(b"one".to_vec()), None]);
    }
}
