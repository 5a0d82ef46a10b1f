use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::result::MethodError;

/// A method name plus its arguments, delivered once and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    method: String,
    arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Call without arguments.
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Look up a keyed argument when the arguments are a map.
    ///
    /// Missing keys, explicit nulls and non-map arguments all yield `Ok(None)`.
    /// A value of the wrong type is an `INVALID_ARGUMENT` error.
    pub fn argument<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MethodError> {
        let Some(value) = self.arguments.get(key) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }

        serde_json::from_value(value.clone()).map(Some).map_err(|e| {
            MethodError::new("INVALID_ARGUMENT", format!("argument '{key}': {e}"))
                .with_details(value.clone())
        })
    }
}
