//! Wire format for method calls and their replies.

use serde_json::{json, Value};

use crate::call::MethodCall;
use crate::result::{MethodError, MethodResult};
use crate::{ChannelError, Result};

/// Encodes calls and result envelopes to bytes and back.
pub trait MethodCodec: Send + Sync {
    fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>>;

    fn decode_method_call(&self, message: &[u8]) -> Result<MethodCall>;

    fn encode_success_envelope(&self, value: &Value) -> Result<Vec<u8>>;

    fn encode_error_envelope(&self, error: &MethodError) -> Result<Vec<u8>>;

    /// Decode a success or error envelope. Never yields `NotImplemented`:
    /// that outcome is the absence of a reply.
    fn decode_envelope(&self, envelope: &[u8]) -> Result<MethodResult>;

    /// Encode a handler's result as a reply. `NotImplemented` has no reply.
    fn encode_result(&self, result: &MethodResult) -> Result<Option<Vec<u8>>> {
        match result {
            MethodResult::Success(value) => self.encode_success_envelope(value).map(Some),
            MethodResult::Error(err) => self.encode_error_envelope(err).map(Some),
            MethodResult::NotImplemented => Ok(None),
        }
    }
}

/// JSON method codec.
///
/// Calls are `{"method": "...", "args": ...}`. A success is `[value]` and an
/// error is `[code, message, details]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMethodCodec;

impl MethodCodec for JsonMethodCodec {
    fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>> {
        let message = json!({
            "method": call.method(),
            "args": call.arguments(),
        });
        Ok(serde_json::to_vec(&message)?)
    }

    fn decode_method_call(&self, message: &[u8]) -> Result<MethodCall> {
        let value: Value = serde_json::from_slice(message)?;
        let Value::Object(mut map) = value else {
            return Err(ChannelError::MalformedCall(
                "expected a JSON object".to_string(),
            ));
        };

        let method = match map.remove("method") {
            Some(Value::String(method)) => method,
            Some(other) => {
                return Err(ChannelError::MalformedCall(format!(
                    "method name must be a string, got {other}"
                )))
            }
            None => {
                return Err(ChannelError::MalformedCall(
                    "missing method name".to_string(),
                ))
            }
        };
        let arguments = map.remove("args").unwrap_or(Value::Null);

        Ok(MethodCall::new(method, arguments))
    }

    fn encode_success_envelope(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&json!([value]))?)
    }

    fn encode_error_envelope(&self, error: &MethodError) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&json!([
            error.code,
            error.message,
            error.details
        ]))?)
    }

    fn decode_envelope(&self, envelope: &[u8]) -> Result<MethodResult> {
        let value: Value = serde_json::from_slice(envelope)?;
        let Value::Array(mut items) = value else {
            return Err(ChannelError::MalformedEnvelope(
                "expected a JSON array".to_string(),
            ));
        };

        match items.len() {
            1 => Ok(MethodResult::Success(items.remove(0))),
            3 => {
                let details = items.remove(2);
                let message = match items.remove(1) {
                    Value::Null => None,
                    Value::String(message) => Some(message),
                    other => {
                        return Err(ChannelError::MalformedEnvelope(format!(
                            "error message must be a string or null, got {other}"
                        )))
                    }
                };
                let Value::String(code) = items.remove(0) else {
                    return Err(ChannelError::MalformedEnvelope(
                        "error code must be a string".to_string(),
                    ));
                };
                Ok(MethodResult::Error(MethodError {
                    code,
                    message,
                    details,
                }))
            }
            n => Err(ChannelError::MalformedEnvelope(format!(
                "expected 1 or 3 elements, got {n}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_call_wire_shape() {
        let codec = JsonMethodCodec;
        let bytes = codec
            .encode_method_call(&MethodCall::new("doSomethingElse", json!({"x": 1})))
            .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"method": "doSomethingElse", "args": {"x": 1}}));
    }

    #[test]
    fn decode_call_without_args_defaults_to_null() {
        let call = JsonMethodCodec
            .decode_method_call(br#"{"method":"getPlatformVersion"}"#)
            .unwrap();
        assert_eq!(call.method(), "getPlatformVersion");
        assert!(call.arguments().is_null());
    }

    #[test]
    fn decode_call_rejects_malformed_messages() {
        let codec = JsonMethodCodec;
        assert!(matches!(
            codec.decode_method_call(b"[1,2]"),
            Err(ChannelError::MalformedCall(_))
        ));
        assert!(matches!(
            codec.decode_method_call(br#"{"method": 7}"#),
            Err(ChannelError::MalformedCall(_))
        ));
        assert!(matches!(
            codec.decode_method_call(br#"{"args": {}}"#),
            Err(ChannelError::MalformedCall(_))
        ));
        assert!(matches!(
            codec.decode_method_call(b"not json"),
            Err(ChannelError::Codec(_))
        ));
    }

    #[test]
    fn error_envelope_keeps_code_message_and_details() {
        let codec = JsonMethodCodec;
        let err = MethodError::new("START_FAILED", "no input").with_details(json!({"device": "mic"}));
        let bytes = codec.encode_error_envelope(&err).unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&bytes).unwrap(),
            json!(["START_FAILED", "no input", {"device": "mic"}])
        );
        assert_eq!(codec.decode_envelope(&bytes).unwrap(), MethodResult::Error(err));
    }

    #[test]
    fn decode_envelope_rejects_unexpected_shapes() {
        let codec = JsonMethodCodec;
        assert!(codec.decode_envelope(b"[]").is_err());
        assert!(codec.decode_envelope(b"[1, 2]").is_err());
        assert!(codec.decode_envelope(br#"{"ok": true}"#).is_err());
        assert!(codec.decode_envelope(br#"[7, null, null]"#).is_err());
        assert_eq!(
            codec.decode_envelope(br#"["E", null, null]"#).unwrap(),
            MethodResult::Error(MethodError {
                code: "E".to_string(),
                message: None,
                details: Value::Null,
            })
        );
    }

    #[test]
    fn not_implemented_encodes_to_no_reply() {
        let codec = JsonMethodCodec;
        assert_eq!(codec.encode_result(&MethodResult::NotImplemented).unwrap(), None);
        let reply = codec.encode_result(&MethodResult::done()).unwrap().unwrap();
        assert_eq!(reply, b"[null]");
    }
}
