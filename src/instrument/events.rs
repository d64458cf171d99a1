//! Event listener instrumentation.
//!
//! Wraps `addEventListener` and `removeEventListener` on the `"events"` bus with an
//! always-emitting interceptor, so listener registration and dispatch are observed
//! even while another wrapper is emitting. Each registered listener, a function or
//! an object with a `handleEvent` method, is replaced by one wrapper emitting
//! `fn-` events. The same listener always maps to the same wrapper, which lets the
//! host de-duplicate registrations and lets removal find what was added.

use super::CALLBACK_PREFIX;
use crate::agent::Agent;
use crate::bus::{Bus, Listener, WeakBus};
use crate::context::{Anchor, AnchorKey, Scope};
use crate::function::{Function, WeakFunction};
use crate::interceptor::{ContextSource, Interceptor};
use crate::sync::lock;
use crate::value::{Args, HostObject, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const EVENTS_BUS: &str = "events";

const ADD_EVENT_LISTENER: &str = "addEventListener";
const REMOVE_EVENT_LISTENER: &str = "removeEventListener";
const SWEEP_INTERVAL: usize = 256;

struct Entry {
    listener: AnchorKey,
    wrapper: WeakFunction,
}

/// Wrappers by listener identity.
///
/// Both sides are held weakly: the host's listener registry owns the wrapper, and
/// the wrapper owns its listener.
#[derive(Default)]
struct WrapperTable {
    entries: Mutex<HashMap<usize, Entry>>,
    inserts: Mutex<usize>,
}

impl WrapperTable {
    fn existing(&self, listener: &Value) -> Option<Function> {
        let key = listener.anchor_key()?;
        let entries = lock(&self.entries);
        let entry = entries.get(&key.addr())?;
        if !entry.listener.is_alive() {
            return None;
        }
        entry.wrapper.upgrade()
    }

    fn get_or_wrap(&self, listener: &Value, wrap: impl FnOnce() -> Option<Function>) -> Option<Function> {
        if let Some(wrapper) = self.existing(listener) {
            return Some(wrapper);
        }
        let key = listener.anchor_key()?;
        let wrapper = wrap()?;

        let mut entries = lock(&self.entries);
        entries.insert(
            key.addr(),
            Entry {
                listener: key,
                wrapper: wrapper.downgrade(),
            },
        );
        let mut inserts = lock(&self.inserts);
        *inserts += 1;
        if *inserts % SWEEP_INTERVAL == 0 {
            entries.retain(|_, e| e.listener.is_alive() && e.wrapper.upgrade().is_some());
        }
        Some(wrapper)
    }
}

/// Instrument listener registration on each of `targets` and return the events bus.
///
/// Pass the objects that own `addEventListener`, typically the global object, the
/// document and the request prototype. Targets without the method are skipped.
pub fn instrument(agent: &Agent, targets: &[&HostObject]) -> Bus {
    let bus = agent.get(EVENTS_BUS);
    let interceptor = Interceptor::always(bus.clone());

    // a listener's context is stored on the listener itself
    let by_listener = ContextSource::resolver(|args: &Args, _this: &Value| {
        Ok(Scope::Anchor(args.get(1).unwrap_or_default()))
    });
    for target in targets {
        interceptor.wrap_in_place(
            target,
            &[ADD_EVENT_LISTENER, REMOVE_EVENT_LISTENER],
            "-",
            by_listener.clone(),
        );
    }

    let table = Arc::new(WrapperTable::default());

    let weak = bus.downgrade();
    let wrappers = Arc::clone(&table);
    bus.on(
        &format!("{}-start", ADD_EVENT_LISTENER),
        Listener::new(move |_ctx, event| {
            let Some(call_args) = event.args_at(0) else {
                return Ok(());
            };
            let Some(listener) = call_args.get(1) else {
                return Ok(());
            };
            if let Some(wrapper) = wrappers.get_or_wrap(&listener, || wrap_listener(&weak, &listener)) {
                call_args.set(1, Value::Function(wrapper));
            }
            Ok(())
        }),
    );

    let wrappers = Arc::clone(&table);
    bus.on(
        &format!("{}-start", REMOVE_EVENT_LISTENER),
        Listener::new(move |_ctx, event| {
            let Some(call_args) = event.args_at(0) else {
                return Ok(());
            };
            let wrapper = call_args.get(1).and_then(|listener| wrappers.existing(&listener));
            if let Some(wrapper) = wrapper {
                call_args.set(1, Value::Function(wrapper));
            }
            Ok(())
        }),
    );

    bus
}

fn wrap_listener(bus: &WeakBus, listener: &Value) -> Option<Function> {
    let bus = bus.upgrade()?;
    let callback = match listener {
        Value::Function(f) if !f.is_wrapped() => f.clone(),
        Value::Object(obj) => Function::from_listener_object(obj.clone()),
        _ => return None,
    };
    let label = match callback.name() {
        "" => "anonymous".to_string(),
        name => name.to_string(),
    };
    Some(Interceptor::always(bus).wrap_function(&callback, CALLBACK_PREFIX, ContextSource::Fresh, Some(&label)))
}
