//! History navigation instrumentation.
//!
//! Wraps `pushState` and `replaceState` on the `"history"` bus, emitting
//! `pushState-start`/`pushState-end` and `replaceState-start`/`replaceState-end`,
//! so single-page navigations are observed as they happen.

use crate::agent::Agent;
use crate::bus::Bus;
use crate::interceptor::{ContextSource, Interceptor};
use crate::value::HostObject;

pub const HISTORY_BUS: &str = "history";

const METHODS: [&str; 2] = ["pushState", "replaceState"];

/// Instrument the navigation methods of `history` and return the history bus.
///
/// Pass the object that owns the methods: the history prototype when the host
/// exposes both methods there, the history object itself otherwise.
pub fn instrument(agent: &Agent, history: &HostObject) -> Bus {
    let bus = agent.get(HISTORY_BUS);
    Interceptor::new(bus.clone()).wrap_in_place(history, &METHODS, "-", ContextSource::Fresh);
    bus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Listener;
    use crate::function::Function;
    use crate::value::Value;
    use std::sync::{Arc, Mutex};

    /// A history object tracking the current URL.
    fn fake_history() -> (HostObject, Arc<Mutex<Vec<String>>>) {
        let history = HostObject::new("history");
        let entries = Arc::new(Mutex::new(vec!["/".to_string()]));

        let stack = Arc::clone(&entries);
        history.set(
            "pushState",
            Function::new("pushState", 3, move |_this, args| {
                stack.lock().unwrap().push(args.str_at(2).unwrap_or_default());
                Ok(Value::Undefined)
            }),
        );
        let stack = Arc::clone(&entries);
        history.set(
            "replaceState",
            Function::new("replaceState", 3, move |_this, args| {
                let mut stack = stack.lock().unwrap();
                if let Some(current) = stack.last_mut() {
                    *current = args.str_at(2).unwrap_or_default();
                }
                Ok(Value::Undefined)
            }),
        );

        (history, entries)
    }

    fn record(bus: &Bus, types: &[&str]) -> Arc<Mutex<Vec<(String, Option<String>)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for event_type in types {
            let log = Arc::clone(&log);
            let tag = event_type.to_string();
            bus.on(
                event_type,
                Listener::new(move |_ctx, event| {
                    let url = event.args_at(0).and_then(|call_args| call_args.str_at(2));
                    log.lock().unwrap().push((tag.clone(), url));
                    Ok(())
                }),
            );
        }
        log
    }

    #[test]
    fn test_navigation_calls_are_observed() {
        let agent = Agent::default();
        let (history, entries) = fake_history();
        let bus = instrument(&agent, &history);
        let log = record(&bus, &["pushState-start", "pushState-end", "replaceState-start"]);

        history
            .call_method("pushState", vec![Value::Undefined, Value::from(""), Value::from("/cart")])
            .unwrap();
        history
            .call_method("replaceState", vec![Value::Undefined, Value::from(""), Value::from("/cart?step=2")])
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("pushState-start".to_string(), Some("/cart".to_string())),
                ("pushState-end".to_string(), Some("/cart".to_string())),
                ("replaceState-start".to_string(), Some("/cart?step=2".to_string())),
            ]
        );
        assert_eq!(*entries.lock().unwrap(), vec!["/".to_string(), "/cart?step=2".to_string()]);
    }

    #[test]
    fn test_navigation_reaches_root_listeners() {
        let agent = Agent::default();
        let (history, _entries) = fake_history();
        instrument(&agent, &history);
        let log = record(&agent.root(), &["pushState-end"]);

        history
            .call_method("pushState", vec![Value::Undefined, Value::from(""), Value::from("/search")])
            .unwrap();

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_methods_are_left_alone() {
        let agent = Agent::default();
        let history = HostObject::new("history");
        history.set("length", 1i64);
        instrument(&agent, &history);

        assert_eq!(history.keys(), vec!["length".to_string()]);
    }
}
