//! Context propagation across asynchronous steps.
//!
//! This module provides the [`Context`] record and the [`ContextStore`] side table
//! that associates one context with each anchor object, so that events produced at
//! different times through the same anchor can be grouped into one operation.

pub mod event_context;
pub mod store;

pub use event_context::Context;
pub use store::{Anchor, AnchorKey, ContextStore, Scope};
