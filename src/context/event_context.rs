//! Correlation record shared by the events of one logical operation.
//!
//! This module provides [`Context`], the mutable record listeners receive as their
//! scope. A context is created for an anchor (a request object, a callback, an
//! argument list) the first time it is looked up, and every later lookup through
//! that anchor returns the same record. Feature code writes whatever it needs to
//! correlate into it: start timestamps, counters, flags.
//!
//! # Examples
//!
//! ```
//! use hookwire::context::Context;
//! use serde_json::json;
//!
//! let ctx = Context::new();
//! ctx.set("method", json!("setTimeout"));
//! ctx.merge(json!({
//!     "timing": { "start": 12 }
//! }));
//! ctx.merge(json!({
//!     "timing": { "end": 40 }
//! }));
//!
//! let fields = ctx.snapshot();
//! assert_eq!(fields["method"], "setTimeout");
//! assert_eq!(fields["timing"]["start"], 12); // preserved by the deep merge
//! assert_eq!(fields["timing"]["end"], 40);
//! ```

use crate::sync::lock;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct ContextInner {
    correlation_id: Uuid,
    fields: Mutex<Value>,
}

/// Per-operation correlation record.
///
/// Cloning a `Context` yields a handle to the same record; contexts are never
/// copied or merged into one another. Compare with [`Context::ptr_eq`].
#[derive(Clone)]
pub struct Context(Arc<ContextInner>);

impl Context {
    /// Create a brand-new context, shared with nothing.
    pub fn new() -> Self {
        Self(Arc::new(ContextInner {
            correlation_id: Uuid::new_v4(),
            fields: Mutex::new(Value::Object(Map::new())),
        }))
    }

    /// Unique id of this context, usable as a correlation id by transports.
    pub fn correlation_id(&self) -> Uuid {
        self.0.correlation_id
    }

    /// Read one field.
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.0.fields).get(key).cloned()
    }

    /// Write one field, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut fields = lock(&self.0.fields);
        if let Value::Object(map) = &mut *fields {
            map.insert(key.into(), value);
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut fields = lock(&self.0.fields);
        match &mut *fields {
            Value::Object(map) => map.remove(key),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.0.fields).get(key).is_some()
    }

    /// Add `delta` to a numeric counter field, starting from 0, and return the new value.
    pub fn increment(&self, key: &str, delta: i64) -> i64 {
        let mut fields = lock(&self.0.fields);
        let current = fields.get(key).and_then(Value::as_i64).unwrap_or(0);
        let next = current + delta;
        if let Value::Object(map) = &mut *fields {
            map.insert(key.to_string(), Value::from(next));
        }
        next
    }

    /// Snapshot of all fields.
    ///
    /// Later writes to the context do not affect the returned value.
    pub fn snapshot(&self) -> Value {
        lock(&self.0.fields).clone()
    }

    /// Deep-merge `update` into the fields.
    ///
    /// Objects merge recursively; arrays and primitives replace. A non-object
    /// update is ignored, the field set always stays an object.
    pub fn merge(&self, update: Value) {
        if !update.is_object() {
            return;
        }
        let mut fields = lock(&self.0.fields);
        deep_merge(&mut fields, update);
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("correlation_id", &self.0.correlation_id)
            .field("fields", &self.snapshot())
            .finish()
    }
}

/// Deep merge two JSON values.
///
/// If both values are objects, recursively merge their fields.
/// Otherwise, replace the destination with the source value.
fn deep_merge(dest: &mut Value, src: Value) {
    match (dest, src) {
        (Value::Object(dest_map), Value::Object(src_map)) => {
            for (key, value) in src_map {
                match dest_map.get_mut(&key) {
                    Some(dest_value) => deep_merge(dest_value, value),
                    None => {
                        dest_map.insert(key, value);
                    }
                }
            }
        }
        (dest_value, src_value) => {
            *dest_value = src_value;
        }
    }
}
