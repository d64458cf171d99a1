//! Callable host capabilities.
//!
//! A [`Function`] is what the interceptor wraps: a body taking a receiver and an
//! argument list, plus the metadata host code can observe (name, arity, static
//! properties). A wrapper produced by the interceptor keeps its original as a
//! marker; the marker is how "already wrapped" is detected and how static
//! property access on the wrapper reaches the original.

use crate::context::{Anchor, AnchorKey};
use crate::sync::lock;
use crate::value::{Args, Exception, HostObject, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Signature of a host function body: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&Value, &Args) -> Result<Value, Exception> + Send + Sync;

struct FunctionInner {
    name: String,
    arity: usize,
    body: Box<NativeFn>,
    statics: Mutex<BTreeMap<String, Value>>,
    original: Option<Function>,
}

/// A host function.
///
/// Cloning yields the same function; use [`Function::ptr_eq`] for identity.
#[derive(Clone)]
pub struct Function(Arc<FunctionInner>);

/// A non-owning handle to a [`Function`].
#[derive(Clone)]
pub struct WeakFunction(Weak<FunctionInner>);

impl WeakFunction {
    pub fn upgrade(&self) -> Option<Function> {
        self.0.upgrade().map(Function)
    }
}

impl Function {
    /// Create a plain host function.
    ///
    /// # Arguments
    ///
    /// * `name` - The function's name as host code sees it
    /// * `arity` - The number of declared parameters
    /// * `body` - The implementation, receiving `this` and the argument list
    pub fn new<F>(name: impl Into<String>, arity: usize, body: F) -> Self
    where
        F: Fn(&Value, &Args) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        Self(Arc::new(FunctionInner {
            name: name.into(),
            arity,
            body: Box::new(body),
            statics: Mutex::new(BTreeMap::new()),
            original: None,
        }))
    }

    /// Adapt a listener-style object, one exposing a `handleEvent` method.
    ///
    /// Calls are forwarded to `handleEvent` with the object as receiver, looked up
    /// at call time so later replacement of the method is honored.
    pub fn from_listener_object(object: HostObject) -> Self {
        let label = format!("{}.handleEvent", object.label());
        Self::new(label, 1, move |_this, args| {
            object.call_method("handleEvent", args.to_vec())
        })
    }

    /// Build a wrapper around `original`, reporting its name and arity.
    pub(crate) fn wrapping<F>(original: &Function, body: F) -> Self
    where
        F: Fn(&Value, &Args) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        Self(Arc::new(FunctionInner {
            name: original.0.name.clone(),
            arity: original.0.arity,
            body: Box::new(body),
            statics: Mutex::new(BTreeMap::new()),
            original: Some(original.clone()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn arity(&self) -> usize {
        self.0.arity
    }

    /// Whether this function was produced by the interceptor.
    pub fn is_wrapped(&self) -> bool {
        self.0.original.is_some()
    }

    /// The function this wrapper stands in for.
    pub fn original(&self) -> Option<&Function> {
        self.0.original.as_ref()
    }

    /// Call with a fresh argument list.
    pub fn call(&self, this: &Value, args: Vec<Value>) -> Result<Value, Exception> {
        self.apply(this, &Args::new(args))
    }

    /// Call with an existing argument list.
    pub fn apply(&self, this: &Value, args: &Args) -> Result<Value, Exception> {
        (self.0.body)(this, args)
    }

    /// Read a static property, proxied to the original for wrappers.
    pub fn get_static(&self, key: &str) -> Option<Value> {
        match &self.0.original {
            Some(original) => original.get_static(key),
            None => lock(&self.0.statics).get(key).cloned(),
        }
    }

    /// Write a static property, proxied to the original for wrappers.
    pub fn set_static(&self, key: impl Into<String>, value: impl Into<Value>) {
        match &self.0.original {
            Some(original) => original.set_static(key, value),
            None => {
                lock(&self.0.statics).insert(key.into(), value.into());
            }
        }
    }

    pub fn static_keys(&self) -> Vec<String> {
        match &self.0.original {
            Some(original) => original.static_keys(),
            None => lock(&self.0.statics).keys().cloned().collect(),
        }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakFunction {
        WeakFunction(Arc::downgrade(&self.0))
    }
}

impl Anchor for Function {
    fn anchor_key(&self) -> Option<AnchorKey> {
        Some(AnchorKey::of(&self.0))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.0.name)
            .field("arity", &self.0.arity)
            .field("wrapped", &self.is_wrapped())
            .finish()
    }
}
