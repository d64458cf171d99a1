//! Host values passed through instrumented calls.
//!
//! The interceptor sits between host code and the functions it calls, so it needs a
//! small dynamic value model: [`Value`] for arguments, receivers and results,
//! [`Args`] for the shared argument list listeners may rewrite, [`Exception`] for
//! errors thrown by host functions, and [`HostObject`] for identity-bearing objects
//! such as a global scope or a request instance.
//!
//! Every type with identity here is reference counted: cloning a handle yields the
//! same object, and `ptr_eq` compares identity rather than content.
//!
//! # Examples
//!
//! ```
//! use hookwire::value::{Args, Value};
//! use serde_json::json;
//!
//! let args = Args::new(vec![Value::from("GET"), Value::from(json!({"retry": false}))]);
//! let alias = args.clone();
//! alias.set(0, Value::from("POST"));
//!
//! assert_eq!(args.get(0).and_then(|v| v.as_str().map(String::from)), Some("POST".to_string()));
//! assert!(args.ptr_eq(&alias));
//! ```

use crate::context::{Anchor, AnchorKey};
use crate::function::Function;
use crate::sync::lock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A dynamic host value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value, the result of a call that threw or returned nothing.
    #[default]
    Undefined,
    /// Plain data with no identity.
    Data(serde_json::Value),
    /// A callable.
    Function(Function),
    /// An identity-bearing object.
    Object(HostObject),
    /// A thrown host error.
    Error(Exception),
    /// A nested argument list, as delivered to lifecycle listeners.
    Args(Args),
}

impl Value {
    /// Check whether this is the absent value
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Get the function, if this value is callable
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Get the host object, if this value is one
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get the exception, if this value is a thrown error
    pub fn as_error(&self) -> Option<&Exception> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Get the nested argument list found in lifecycle event arguments
    pub fn as_args(&self) -> Option<&Args> {
        match self {
            Value::Args(a) => Some(a),
            _ => None,
        }
    }

    /// Get the plain data, if this value has no identity
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(d) => Some(d),
            _ => None,
        }
    }

    /// Get the string, if this value is string data
    ///
    /// # Examples
    ///
    /// ```
    /// use hookwire::value::Value;
    ///
    /// assert_eq!(Value::from("click").as_str(), Some("click"));
    /// assert_eq!(Value::from(3i64).as_str(), None);
    /// ```
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(|d| d.as_str())
    }

    /// Numeric coercion for data values.
    ///
    /// Numbers pass through, numeric strings are parsed, booleans become 0 or 1 and
    /// null becomes 0. Anything else, including non-numeric strings, yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self.as_data()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
                }
            }
            serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Null => Some(0.0),
            _ => None,
        }
    }

    /// Identity comparison for reference values, equality for data.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a.ptr_eq(b),
            (Value::Args(a), Value::Args(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Anchor for Value {
    fn anchor_key(&self) -> Option<AnchorKey> {
        match self {
            Value::Undefined | Value::Data(_) => None,
            Value::Function(f) => f.anchor_key(),
            Value::Object(o) => o.anchor_key(),
            Value::Error(e) => e.anchor_key(),
            Value::Args(a) => a.anchor_key(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Data(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Data(serde_json::Value::String(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Data(serde_json::json!(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Data(serde_json::json!(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Data(serde_json::Value::Bool(value))
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<HostObject> for Value {
    fn from(value: HostObject) -> Self {
        Value::Object(value)
    }
}

impl From<Exception> for Value {
    fn from(value: Exception) -> Self {
        Value::Error(value)
    }
}

impl From<Args> for Value {
    fn from(value: Args) -> Self {
        Value::Args(value)
    }
}

/// A shared, mutable argument list.
///
/// The instance handed to `start` listeners is the one later passed to the original
/// function, and the one recorded in buffer groups.
#[derive(Clone, Default)]
pub struct Args(Arc<Mutex<Vec<Value>>>);

impl Args {
    /// Create an argument list holding `values`
    pub fn new(values: Vec<Value>) -> Self {
        Self(Arc::new(Mutex::new(values)))
    }

    /// Create an empty argument list
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the number of arguments
    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    /// Check whether the list holds no arguments
    pub fn is_empty(&self) -> bool {
        lock(&self.0).is_empty()
    }

    /// Get a copy of the argument at `index`
    ///
    /// Reference values share identity with the stored argument; data is cloned.
    pub fn get(&self, index: usize) -> Option<Value> {
        lock(&self.0).get(index).cloned()
    }

    /// Replace the value at `index`, padding with `Undefined` when the list is shorter.
    pub fn set(&self, index: usize, value: Value) {
        let mut values = lock(&self.0);
        if index >= values.len() {
            values.resize(index + 1, Value::Undefined);
        }
        values[index] = value;
    }

    /// Append an argument
    pub fn push(&self, value: Value) {
        lock(&self.0).push(value);
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<Value> {
        lock(&self.0).clone()
    }

    /// The nested argument list at `index`, as found in lifecycle events.
    pub fn args_at(&self, index: usize) -> Option<Args> {
        self.get(index).and_then(|v| v.as_args().cloned())
    }

    /// The function at `index`, typically a callback being scheduled.
    pub fn function_at(&self, index: usize) -> Option<Function> {
        self.get(index).and_then(|v| v.as_function().cloned())
    }

    /// The exception at `index`, as found in `err` events.
    pub fn error_at(&self, index: usize) -> Option<Exception> {
        self.get(index).and_then(|v| v.as_error().cloned())
    }

    /// The string data at `index`, such as a method label.
    pub fn str_at(&self, index: usize) -> Option<String> {
        self.get(index).and_then(|v| v.as_str().map(String::from))
    }

    /// Check whether both handles refer to the same list
    pub fn ptr_eq(&self, other: &Args) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Args::new(values)
    }
}

impl Anchor for Args {
    fn anchor_key(&self) -> Option<AnchorKey> {
        Some(AnchorKey::of(&self.0))
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

struct ExceptionInner {
    name: String,
    message: String,
}

/// An error thrown by host code.
///
/// Rethrowing hands back the identical instance, so listeners and callers can
/// compare with [`Exception::ptr_eq`].
#[derive(Clone)]
pub struct Exception(Arc<ExceptionInner>);

impl Exception {
    /// Create a generic `Error`.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_name("Error", message)
    }

    pub fn with_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self(Arc::new(ExceptionInner {
            name: name.into(),
            message: message.into(),
        }))
    }

    /// Get the error name, e.g. `TypeError`
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn ptr_eq(&self, other: &Exception) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Anchor for Exception {
    fn anchor_key(&self) -> Option<AnchorKey> {
        Some(AnchorKey::of(&self.0))
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.name, self.0.message)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("name", &self.0.name)
            .field("message", &self.0.message)
            .finish()
    }
}

impl std::error::Error for Exception {}

struct HostObjectInner {
    label: String,
    properties: Mutex<BTreeMap<String, Value>>,
}

/// An identity-bearing host object with named properties.
///
/// Methods are properties holding a [`Function`]; `wrap_in_place` swaps them for
/// instrumented versions.
#[derive(Clone)]
pub struct HostObject(Arc<HostObjectInner>);

impl HostObject {
    /// Create an object with no properties.
    ///
    /// # Arguments
    ///
    /// * `label` - A name for diagnostics, used in `TypeError` messages
    pub fn new(label: impl Into<String>) -> Self {
        Self(Arc::new(HostObjectInner {
            label: label.into(),
            properties: Mutex::new(BTreeMap::new()),
        }))
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Get a copy of the property `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.0.properties).get(key).cloned()
    }

    /// Set the property `key`, replacing any previous value
    ///
    /// # Examples
    ///
    /// ```
    /// use hookwire::value::HostObject;
    ///
    /// let history = HostObject::new("history");
    /// history.set("length", 1i64);
    /// assert_eq!(history.get("length").and_then(|v| v.as_number()), Some(1.0));
    /// ```
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        lock(&self.0.properties).insert(key.into(), value.into());
    }

    /// Remove the property `key`, returning its value
    pub fn remove(&self, key: &str) -> Option<Value> {
        lock(&self.0.properties).remove(key)
    }

    /// Check whether the property `key` exists
    pub fn has(&self, key: &str) -> bool {
        lock(&self.0.properties).contains_key(key)
    }

    /// Get the property names in sorted order
    pub fn keys(&self) -> Vec<String> {
        lock(&self.0.properties).keys().cloned().collect()
    }

    /// Get the property `name` if it holds a function
    pub fn method(&self, name: &str) -> Option<Function> {
        self.get(name).and_then(|v| v.as_function().cloned())
    }

    /// Call the method `name` with this object as the receiver.
    pub fn call_method(&self, name: &str, args: Vec<Value>) -> Result<Value, Exception> {
        let method = self.method(name).ok_or_else(|| {
            Exception::with_name("TypeError", format!("{}.{} is not a function", self.label(), name))
        })?;
        method.call(&Value::Object(self.clone()), args)
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Anchor for HostObject {
    fn anchor_key(&self) -> Option<AnchorKey> {
        Some(AnchorKey::of(&self.0))
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("label", &self.0.label)
            .field("keys", &self.keys())
            .finish()
    }
}
