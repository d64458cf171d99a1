//! Buffered hand-off to the late-loading agent.
//!
//! [`handle`] declares an event type as buffered on the `"handle"` bus and emits it
//! there, so the event is both seen by any listener already present and kept in
//! the backlog for the consumer that attaches later.

use crate::agent::Agent;
use crate::context::{Context, Scope};
use crate::error::Result;
use crate::value::{Args, Value};

/// Name of the hand-off bus.
pub const HANDLE_BUS: &str = "handle";

/// Buffer group for API calls made before the agent loaded.
pub const API_GROUP: &str = "api";

/// Buffer `event_type` into `group` (`"feature"` when `None`) and emit it on the
/// hand-off bus.
pub fn handle(
    agent: &Agent,
    event_type: &str,
    args: Args,
    scope: impl Into<Scope>,
    group: Option<&str>,
) -> Result<Option<Context>> {
    let bus = agent.get(HANDLE_BUS);
    bus.buffer(&[event_type], group);
    bus.emit(event_type, &args, scope)
}

/// Record a named timing mark in the `"api"` group.
pub fn mark(agent: &Agent, name: &str, timestamp: i64) -> Result<Option<Context>> {
    handle(
        agent,
        "mark",
        Args::new(vec![Value::from(name), Value::from(timestamp)]),
        Scope::Fresh,
        Some(API_GROUP),
    )
}
