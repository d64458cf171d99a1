//! Error types and result aliases for the Hookwire library.
//!
//! This module defines the core error type [`HookwireError`] and the [`Result`] type alias
//! used by the library's own bookkeeping: listeners, context resolvers, configuration
//! loading. Errors raised by host functions are not represented here; they travel as
//! [`Exception`](crate::value::Exception) values and are never converted.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookwireError {
    #[error("Listener error: {0}")]
    ListenerError(String),

    #[error("Context resolution error: {0}")]
    ContextError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HookwireError>;
