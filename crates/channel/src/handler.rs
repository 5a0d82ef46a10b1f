use std::collections::HashMap;
use std::fmt;

use crate::call::MethodCall;
use crate::result::MethodResult;

/// Receives method calls delivered over a channel.
pub trait MethodCallHandler: Send + Sync {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult;
}

type MethodFn = Box<dyn Fn(&MethodCall) -> MethodResult + Send + Sync>;

/// Dispatch table from method name to handler, falling back to
/// [`MethodResult::NotImplemented`] for unknown names.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<String, MethodFn>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MethodTable::insert`].
    pub fn with<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&MethodCall) -> MethodResult + Send + Sync + 'static,
    {
        self.insert(method, handler);
        self
    }

    /// Register `handler` for `method`, replacing any earlier one.
    /// Returns true when a handler was replaced.
    pub fn insert<F>(&mut self, method: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&MethodCall) -> MethodResult + Send + Sync + 'static,
    {
        self.methods
            .insert(method.into(), Box::new(handler))
            .is_some()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl MethodCallHandler for MethodTable {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult {
        match self.methods.get(call.method()) {
            Some(handler) => handler(call),
            None => MethodResult::NotImplemented,
        }
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.method_names())
            .finish()
    }
}
