//! Instrumentation of host capabilities.
//!
//! Each submodule wraps a family of host functions in place on the objects that
//! own them. Callbacks handed to those functions (timer callbacks, frame callbacks,
//! event listeners, observer callbacks) are wrapped with the `fn-` prefix, so their
//! runs show up as `fn-start`/`fn-end` on the submodule's bus.

pub mod events;
pub mod history;
pub mod mutation;
pub mod raf;
pub mod timer;

/// Prefix of events emitted by wrapped callbacks.
pub const CALLBACK_PREFIX: &str = "fn-";
