//! Event bus: named hubs, listener chains and event buffering.
//!
//! # Architecture
//!
//! - **Bus**: per-type listener chains, buffering declarations, child buses
//! - **Listener**: an identity-compared callback receiving the context and arguments
//! - **EventBuffer**: the agent-wide backlog of recorded events, keyed by group
//!
//! # Usage Example
//!
//! ```rust
//! use hookwire::agent::Agent;
//! use hookwire::bus::Listener;
//! use hookwire::context::Scope;
//! use hookwire::value::Args;
//!
//! let agent = Agent::default();
//! let xhr = agent.get("xhr");
//! xhr.buffer(&["send-xhr-start"], None);
//! xhr.on("send-xhr-start", Listener::new(|ctx, _args| {
//!     ctx.set("sent", serde_json::json!(true));
//!     Ok(())
//! }));
//!
//! xhr.emit("send-xhr-start", &Args::empty(), Scope::Fresh).unwrap();
//! assert_eq!(agent.backlog().len("feature"), 1);
//! ```

pub mod buffer;
pub mod event_bus;
pub mod listener;

pub use buffer::{BufferedEvent, EventBuffer};
pub use event_bus::{Bus, WeakBus, DEFAULT_GROUP};
pub use listener::Listener;
