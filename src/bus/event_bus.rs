//! Hierarchical publish/subscribe hub.
//!
//! A [`Bus`] holds per-type listener chains and the buffering declarations for its
//! event types. Child buses are created through [`Bus::get`], cached by name for the
//! lifetime of their agent, and forward every emission through their parent's
//! dispatch before running their own listeners.

use super::buffer::BufferedEvent;
use super::listener::Listener;
use crate::agent::Core;
use crate::context::{Context, Scope};
use crate::error::Result;
use crate::sync::lock;
use crate::value::Args;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Buffer group used when `buffer` is given none.
pub const DEFAULT_GROUP: &str = "feature";

struct BusInner {
    name: Option<String>,
    parent: Option<Bus>,
    handlers: Mutex<HashMap<String, Vec<Listener>>>,
    buffer_groups: Mutex<HashMap<String, String>>,
    core: Weak<Core>,
}

/// An event hub.
///
/// Cloning yields the same bus. A bus only works while its agent is alive; once
/// the agent is dropped every emission is a no-op.
#[derive(Clone)]
pub struct Bus(Arc<BusInner>);

/// A non-owning handle to a [`Bus`], for listeners that must not keep their own
/// bus alive.
#[derive(Clone)]
pub struct WeakBus(Weak<BusInner>);

impl WeakBus {
    pub fn upgrade(&self) -> Option<Bus> {
        self.0.upgrade().map(Bus)
    }
}

impl Bus {
    pub(crate) fn root(core: Weak<Core>) -> Self {
        Self::with_parent(None, None, core)
    }

    fn with_parent(name: Option<String>, parent: Option<Bus>, core: Weak<Core>) -> Self {
        Self(Arc::new(BusInner {
            name,
            parent,
            handlers: Mutex::new(HashMap::new()),
            buffer_groups: Mutex::new(HashMap::new()),
            core,
        }))
    }

    pub(crate) fn core(&self) -> Option<Arc<Core>> {
        self.0.core.upgrade()
    }

    /// The bus name, `None` for the root bus.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn parent(&self) -> Option<&Bus> {
        self.0.parent.as_ref()
    }

    pub fn downgrade(&self) -> WeakBus {
        WeakBus(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Bus) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Append a listener to the chain for `event_type`.
    ///
    /// No de-duplication: a listener registered twice runs twice.
    pub fn on(&self, event_type: &str, listener: Listener) {
        lock(&self.0.handlers)
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove the first registration of `listener` for `event_type`.
    pub fn off(&self, event_type: &str, listener: &Listener) {
        let mut handlers = lock(&self.0.handlers);
        if let Some(chain) = handlers.get_mut(event_type) {
            if let Some(pos) = chain.iter().position(|l| l.ptr_eq(listener)) {
                chain.remove(pos);
            }
        }
    }

    /// Snapshot of the listener chain for `event_type`.
    pub fn listeners(&self, event_type: &str) -> Vec<Listener> {
        lock(&self.0.handlers)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a scope to a context through the agent's context store.
    pub fn context(&self, scope: impl Into<Scope>) -> Context {
        let scope = scope.into();
        match self.core() {
            Some(core) => core.contexts.resolve(&scope),
            None => match scope {
                Scope::Context(ctx) => ctx,
                _ => Context::new(),
            },
        }
    }

    /// Emit an event.
    ///
    /// See [`Bus::emit_with`]; this form never forces.
    pub fn emit(&self, event_type: &str, args: &Args, scope: impl Into<Scope>) -> Result<Option<Context>> {
        self.emit_with(event_type, args, scope, false)
    }

    /// Emit an event, optionally forcing it through an aborted agent.
    ///
    /// Forwards through the parent chain first, then resolves the context and runs
    /// every current listener for `event_type` in registration order. After the
    /// listeners, the event is recorded if its type is declared into a buffer group
    /// that still exists. Returns the resolved context, or `None` if the emission
    /// was dropped because the agent is aborted or gone.
    ///
    /// A listener error stops the chain and is returned to the caller.
    pub fn emit_with(
        &self,
        event_type: &str,
        args: &Args,
        scope: impl Into<Scope>,
        force: bool,
    ) -> Result<Option<Context>> {
        let scope = scope.into();
        let Some(core) = self.core() else {
            return Ok(None);
        };
        if core.is_aborted() && !force {
            return Ok(None);
        }

        if let Some(parent) = &self.0.parent {
            parent.emit_with(event_type, args, scope.clone(), false)?;
        }

        let ctx = core.contexts.resolve(&scope);
        for listener in self.listeners(event_type) {
            listener.call(&ctx, args)?;
        }

        let group = lock(&self.0.buffer_groups).get(event_type).cloned();
        if let Some(group) = group {
            core.backlog.push(
                &group,
                BufferedEvent {
                    bus: self.0.name.clone(),
                    event_type: event_type.to_string(),
                    args: args.clone(),
                    context: ctx.clone(),
                    recorded_at: Utc::now(),
                },
            );
        }

        Ok(Some(ctx))
    }

    /// Get or create the child bus named `name`.
    ///
    /// The cache is shared by every bus of the agent and keyed by name only: the
    /// first bus to ask for a name becomes that child's parent.
    pub fn get(&self, name: &str) -> Bus {
        let Some(core) = self.core() else {
            return Self::with_parent(Some(name.to_string()), Some(self.clone()), Weak::new());
        };

        let mut buses = lock(&core.buses);
        buses
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(bus = name, parent = ?self.name(), "creating bus");
                Self::with_parent(Some(name.to_string()), Some(self.clone()), self.0.core.clone())
            })
            .clone()
    }

    /// Declare that `types`, once emitted on this bus, are recorded into `group`
    /// (`"feature"` when `None`), creating the group if needed.
    ///
    /// Emissions that happened before the declaration are not recorded.
    pub fn buffer(&self, types: &[&str], group: Option<&str>) {
        let group = group.unwrap_or(DEFAULT_GROUP);
        let Some(core) = self.core() else {
            return;
        };

        let mut map = lock(&self.0.buffer_groups);
        for event_type in types {
            map.insert(event_type.to_string(), group.to_string());
            core.backlog.declare(group);
        }
        debug!(bus = ?self.name(), group, types = ?types, "buffering event types");
    }

    /// The buffer group `event_type` is declared into on this bus.
    pub fn buffer_group(&self, event_type: &str) -> Option<String> {
        lock(&self.0.buffer_groups).get(event_type).cloned()
    }

    /// Abort the whole agent if consumers never attached. See [`crate::agent::Agent::abort`].
    pub fn abort(&self) -> bool {
        self.core().map(|core| core.abort()).unwrap_or(false)
    }

    pub fn is_aborted(&self) -> bool {
        self.core().map(|core| core.is_aborted()).unwrap_or(true)
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("name", &self.0.name)
            .field("parent", &self.0.parent.as_ref().map(|p| p.name().map(String::from)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::error::HookwireError;
    use crate::value::{HostObject, Value};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let listener = Listener::new(move |_ctx, _args| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, listener)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Listener {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Listener::new(move |_ctx, _args| {
            log.lock().unwrap().push(tag.clone());
            Ok(())
        })
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let agent = Agent::default();
        let bus = agent.root();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("x", recorder(&log, "first"));
        bus.on("x", recorder(&log, "second"));

        bus.emit("x", &Args::empty(), Scope::Fresh).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_listener_runs_twice_and_off_removes_one() {
        let agent = Agent::default();
        let bus = agent.root();
        let (count, listener) = counter();
        bus.on("x", listener.clone());
        bus.on("x", listener.clone());

        bus.emit("x", &Args::empty(), Scope::Fresh).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        bus.off("x", &listener);
        bus.emit("x", &Args::empty(), Scope::Fresh).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(bus.listeners("x").len(), 1);
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let agent = Agent::default();
        let (_count, listener) = counter();
        agent.root().off("never", &listener);
        assert!(agent.root().listeners("never").is_empty());
    }

    #[test]
    fn test_emit_returns_context_mutated_by_listeners() {
        let agent = Agent::default();
        let bus = agent.root();
        bus.on(
            "x",
            Listener::new(|ctx, args| {
                ctx.set("seen", json!(args.len()));
                Ok(())
            }),
        );

        let ctx = bus
            .emit("x", &Args::new(vec![Value::Undefined, Value::Undefined]), Scope::Fresh)
            .unwrap()
            .unwrap();
        assert_eq!(ctx.get("seen"), Some(json!(2)));
    }

    #[test]
    fn test_emit_with_anchor_reuses_context() {
        let agent = Agent::default();
        let bus = agent.root();
        let xhr = HostObject::new("xhr");

        let a = bus.emit("open", &Args::empty(), &xhr).unwrap().unwrap();
        let b = bus.emit("send", &Args::empty(), &xhr).unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&agent.context_for(&xhr)));
    }

    #[test]
    fn test_emit_passes_context_through() {
        let agent = Agent::default();
        let ctx = Context::new();
        let resolved = agent.root().emit("x", &Args::empty(), &ctx).unwrap().unwrap();
        assert!(resolved.ptr_eq(&ctx));
    }

    #[test]
    fn test_get_returns_cached_child() {
        let agent = Agent::default();
        let a = agent.root().get("xhr");
        let b = agent.get("xhr");

        assert!(a.ptr_eq(&b));
        assert_eq!(a.name(), Some("xhr"));
        assert!(a.parent().unwrap().ptr_eq(&agent.root()));
    }

    #[test]
    fn test_cache_is_keyed_by_name_only() {
        let agent = Agent::default();
        let events = agent.get("events");
        let nested = events.get("jsonp");

        assert!(nested.parent().unwrap().ptr_eq(&events));
        assert!(agent.get("jsonp").ptr_eq(&nested));
    }

    #[test]
    fn test_child_forwards_to_parent_first() {
        let agent = Agent::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let child = agent.get("xhr");
        agent.root().on("send-xhr-start", recorder(&log, "root"));
        child.on("send-xhr-start", recorder(&log, "xhr"));

        child.emit("send-xhr-start", &Args::empty(), Scope::Fresh).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["root", "xhr"]);
    }

    #[test]
    fn test_parent_emission_does_not_reach_child() {
        let agent = Agent::default();
        let (count, listener) = counter();
        agent.get("timer").on("x", listener);

        agent.root().emit("x", &Args::empty(), Scope::Fresh).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parent_and_child_share_anchor_context() {
        let agent = Agent::default();
        let child = agent.get("xhr");
        let xhr = HostObject::new("xhr");
        let parent_ctx = Arc::new(Mutex::new(None));
        let parent_ctx_clone = Arc::clone(&parent_ctx);
        agent.root().on(
            "x",
            Listener::new(move |ctx, _args| {
                *parent_ctx_clone.lock().unwrap() = Some(ctx.clone());
                Ok(())
            }),
        );

        let ctx = child.emit("x", &Args::empty(), &xhr).unwrap().unwrap();
        assert!(parent_ctx.lock().unwrap().as_ref().unwrap().ptr_eq(&ctx));
    }

    #[test]
    fn test_listener_error_propagates_and_stops_chain() {
        let agent = Agent::default();
        let bus = agent.root();
        let (count, listener) = counter();
        bus.on(
            "x",
            Listener::new(|_ctx, _args| Err(HookwireError::ListenerError("bad".to_string()))),
        );
        bus.on("x", listener);

        let result = bus.emit("x", &Args::empty(), Scope::Fresh);
        assert!(matches!(result, Err(HookwireError::ListenerError(_))));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_buffering_records_exact_args_after_listeners() {
        let agent = Agent::default();
        let bus = agent.get("handle");
        bus.buffer(&["y"], None);
        bus.on(
            "y",
            Listener::new(|ctx, _args| {
                ctx.set("touched", json!(true));
                Ok(())
            }),
        );

        let sent: Vec<Args> = (0..3).map(|i| Args::new(vec![Value::from(i as i64)])).collect();
        for args in &sent {
            bus.emit("y", args, Scope::Fresh).unwrap();
        }

        let events = agent.backlog().group("feature").unwrap();
        assert_eq!(events.len(), 3);
        for (event, args) in events.iter().zip(&sent) {
            assert!(event.args.ptr_eq(args));
            assert_eq!(event.bus.as_deref(), Some("handle"));
            assert_eq!(event.event_type, "y");
            assert_eq!(event.context.get("touched"), Some(json!(true)));
        }
    }

    #[test]
    fn test_buffering_counts_events_before_and_after_listener() {
        let agent = Agent::default();
        let bus = agent.root();
        bus.buffer(&["y"], Some("api"));

        bus.emit("y", &Args::empty(), Scope::Fresh).unwrap();
        bus.emit("y", &Args::empty(), Scope::Fresh).unwrap();
        let (_count, listener) = counter();
        bus.on("y", listener);
        bus.emit("y", &Args::empty(), Scope::Fresh).unwrap();

        assert_eq!(agent.backlog().len("api"), 3);
    }

    #[test]
    fn test_no_retroactive_buffering() {
        let agent = Agent::default();
        let bus = agent.root();
        bus.emit("late", &Args::empty(), Scope::Fresh).unwrap();
        bus.buffer(&["late"], None);
        bus.emit("late", &Args::empty(), Scope::Fresh).unwrap();

        assert_eq!(agent.backlog().len("feature"), 1);
    }

    #[test]
    fn test_child_and_parent_buffer_independently() {
        let agent = Agent::default();
        let child = agent.get("timer");
        agent.root().buffer(&["tick"], Some("root-group"));
        child.buffer(&["tick"], Some("timer-group"));

        child.emit("tick", &Args::empty(), Scope::Fresh).unwrap();
        assert_eq!(agent.backlog().len("root-group"), 1);
        assert_eq!(agent.backlog().len("timer-group"), 1);
        assert_eq!(child.buffer_group("tick").as_deref(), Some("timer-group"));
    }

    #[test]
    fn test_abort_is_noop_without_waiting_consumers() {
        let agent = Agent::default();
        agent.root().buffer(&["x"], Some("ajax"));

        assert!(!agent.root().abort());
        assert!(!agent.is_aborted());
    }

    #[test]
    fn test_abort_clears_buffers_and_silences_emit() {
        let agent = Agent::default();
        let bus = agent.get("b");
        let (count, listener) = counter();
        bus.on("y", listener);
        bus.buffer(&["y"], None);
        for i in 0..3 {
            bus.emit("y", &Args::new(vec![Value::from(i as i64)]), Scope::Fresh)
                .unwrap();
        }
        assert_eq!(agent.backlog().len("feature"), 3);

        assert!(bus.abort());
        assert!(agent.backlog().is_empty());
        assert!(agent.backlog().group("feature").is_none());

        let result = bus.emit("y", &Args::empty(), Scope::Fresh).unwrap();
        assert!(result.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_forced_emit_runs_after_abort_without_buffering() {
        let agent = Agent::default();
        let bus = agent.root();
        let (count, listener) = counter();
        bus.on("y", listener);
        bus.buffer(&["y"], None);
        bus.emit("y", &Args::empty(), Scope::Fresh).unwrap();
        agent.abort();

        let ctx = bus.emit_with("y", &Args::empty(), Scope::Fresh, true).unwrap();
        assert!(ctx.is_some());
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(agent.backlog().is_empty());
    }

    #[test]
    fn test_bus_outliving_agent_is_inert() {
        let bus = {
            let agent = Agent::default();
            agent.get("orphan")
        };
        let (count, listener) = counter();
        bus.on("x", listener);

        assert!(bus.emit("x", &Args::empty(), Scope::Fresh).unwrap().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(bus.is_aborted());
    }
}
