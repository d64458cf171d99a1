//! Hookwire: the event core of a page-monitoring agent.
//!
//! An [`Agent`](agent::Agent) owns a tree of named event buses, a side table of
//! per-object contexts and the buffers that hold events until a consumer drains
//! them. Host functions are wrapped by an [`Interceptor`](interceptor::Interceptor)
//! so each call is observed as `start`/`err`/`end` events without changing what
//! the caller sees.

pub mod agent;
pub mod bus;
pub mod clock;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod function;
pub mod handle;
pub mod ids;
pub mod instrument;
pub mod interceptor;
pub mod value;

mod sync;

pub use error::{HookwireError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::Agent;
    pub use crate::bus::{Bus, Listener};
    pub use crate::config::LoaderConfig;
    pub use crate::context::{Context, Scope};
    pub use crate::error::{HookwireError, Result};
    pub use crate::function::Function;
    pub use crate::interceptor::{ContextSource, Interceptor};
    pub use crate::value::{Args, Exception, HostObject, Value};
}
