use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Failure reported back to the caller of a method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodError {
    pub code: String,
    pub message: Option<String>,
    pub details: Value,
}

impl MethodError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for MethodError {}

/// Outcome of a single method call.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(Value),
    Error(MethodError),
    /// No handler exists for the method. Distinct from `Success(Value::Null)`.
    NotImplemented,
}

impl MethodResult {
    /// Serialize `value` into a success payload.
    pub fn success<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Error(MethodError::new("SERIALIZATION_FAILED", e.to_string())),
        }
    }

    /// `Success(null)`, the reply for calls that only have side effects.
    pub fn done() -> Self {
        Self::Success(Value::Null)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(MethodError::new(code, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented)
    }

    /// Success payload as a string, if that is what it holds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Success(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<MethodError> for MethodResult {
    fn from(err: MethodError) -> Self {
        Self::Error(err)
    }
}
