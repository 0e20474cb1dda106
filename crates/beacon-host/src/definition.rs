//! Host construct definitions.
//!
//! A [`Definition`] is what user code hands to an App, Page or Component
//! factory: plain data plus named handlers. Handlers receive the host
//! instance explicitly (the receiver) and the call arguments as JSON values.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use beacon_core::{ConstructKind, LifecycleHook};

use crate::error::HostError;

/// Error returned by a user handler. Instrumentation passes it through untouched.
pub type CallError = Box<dyn std::error::Error + Send + Sync>;

/// Result of invoking a handler.
pub type CallResult = std::result::Result<Value, CallError>;

/// A named function on a definition, bound to instances of type `I`.
pub type Handler<I> = Arc<dyn Fn(&mut I, &[Value]) -> CallResult + Send + Sync>;

/// Where a construct family keeps its interceptable methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodScope {
    /// Top-level functions outside the recognized hook set.
    TopLevel,
    /// The nested `methods` table.
    Nested,
    /// No method interception.
    None,
}

impl MethodScope {
    /// Method scope used by a construct family.
    pub fn for_kind(kind: ConstructKind) -> Self {
        match kind {
            ConstructKind::App => MethodScope::None,
            ConstructKind::Page => MethodScope::TopLevel,
            ConstructKind::Component => MethodScope::Nested,
        }
    }
}

/// Definition of an App, Page or Component.
pub struct Definition<I> {
    kind: ConstructKind,
    identifier: String,
    data: Map<String, Value>,
    pub(crate) functions: BTreeMap<String, Handler<I>>,
    pub(crate) methods: BTreeMap<String, Handler<I>>,
    /// Lifecycle shims for hooks the user did not declare. Not enumerable.
    pub(crate) shims: BTreeMap<LifecycleHook, Handler<I>>,
    pub(crate) instrumented: bool,
}

impl<I> Definition<I> {
    /// Create an empty definition.
    pub fn new(kind: ConstructKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            data: Map::new(),
            functions: BTreeMap::new(),
            methods: BTreeMap::new(),
            shims: BTreeMap::new(),
            instrumented: false,
        }
    }

    /// Definition of the application root.
    pub fn app() -> Self {
        Self::new(ConstructKind::App, "")
    }

    /// Definition of the page at `route`.
    pub fn page(route: impl Into<String>) -> Self {
        Self::new(ConstructKind::Page, route)
    }

    /// Definition of the component identified by `is`.
    pub fn component(is: impl Into<String>) -> Self {
        Self::new(ConstructKind::Component, is)
    }

    /// Add a plain data property.
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Add a top-level function.
    pub fn with_function<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut I, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(handler));
        self
    }

    /// Add a lifecycle hook. Shorthand for [`with_function`](Self::with_function).
    pub fn with_hook<F>(self, hook: LifecycleHook, handler: F) -> Self
    where
        F: Fn(&mut I, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.with_function(hook.as_str(), handler)
    }

    /// Add a method to the nested `methods` table.
    pub fn with_method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut I, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    /// Construct family.
    pub fn kind(&self) -> ConstructKind {
        self.kind
    }

    /// Route or component identifier; empty for the app.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Plain data properties.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Whether instrumentation has been applied.
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    /// Enumerable property names, as the host would see them.
    pub fn property_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.data.keys().cloned().collect();
        names.extend(self.functions.keys().cloned());
        if !self.methods.is_empty() {
            names.insert("methods".to_string());
        }
        names
    }

    /// Names of top-level functions.
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Names in the nested `methods` table.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Recognized hooks the user declared.
    pub fn declared_hooks(&self) -> Vec<LifecycleHook> {
        self.kind
            .recognized_hooks()
            .iter()
            .copied()
            .filter(|hook| self.functions.contains_key(hook.as_str()))
            .collect()
    }

    /// Invoke a lifecycle hook, as the host does on a lifecycle transition.
    ///
    /// A recognized hook with no handler completes with `null`.
    pub fn invoke_hook(&self, hook: LifecycleHook, instance: &mut I, args: &[Value]) -> CallResult {
        if let Some(handler) = self.functions.get(hook.as_str()) {
            return handler(instance, args);
        }
        if let Some(shim) = self.shims.get(&hook) {
            return shim(instance, args);
        }
        if self.kind.recognizes(hook) {
            return Ok(Value::Null);
        }
        Err(self.not_found(hook.as_str()))
    }

    /// Invoke a top-level function by name.
    pub fn call(&self, name: &str, instance: &mut I, args: &[Value]) -> CallResult {
        match LifecycleHook::from_name(name) {
            Some(hook) if self.kind.recognizes(hook) => self.invoke_hook(hook, instance, args),
            _ => match self.functions.get(name) {
                Some(handler) => handler(instance, args),
                None => Err(self.not_found(name)),
            },
        }
    }

    /// Invoke a method from the nested `methods` table.
    pub fn call_method(&self, name: &str, instance: &mut I, args: &[Value]) -> CallResult {
        match self.methods.get(name) {
            Some(handler) => handler(instance, args),
            None => Err(self.not_found(name)),
        }
    }

    fn not_found(&self, name: &str) -> CallError {
        Box::new(HostError::HandlerNotFound {
            kind: self.kind,
            identifier: self.identifier.clone(),
            name: name.to_string(),
        })
    }
}

impl<I> std::fmt::Debug for Definition<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("kind", &self.kind)
            .field("identifier", &self.identifier)
            .field("data", &self.data)
            .field("functions", &self.function_names())
            .field("methods", &self.method_names())
            .field("instrumented", &self.instrumented)
            .finish()
    }
}
