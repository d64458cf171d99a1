//! Mutation observer instrumentation.
//!
//! Replaces the global `MutationObserver` constructor with one that wraps the
//! observer callback, so each mutation delivery emits `fn-start`/`fn-end` on the
//! `"mutation"` bus. The replacement keeps the original's name, arity and static
//! properties.

use super::CALLBACK_PREFIX;
use crate::agent::Agent;
use crate::bus::Bus;
use crate::function::Function;
use crate::interceptor::{ContextSource, Interceptor};
use crate::value::{Args, HostObject};

pub const MUTATION_BUS: &str = "mutation";

const CONSTRUCTOR: &str = "MutationObserver";

/// Instrument the observer constructor of `global` and return the mutation bus.
pub fn instrument(agent: &Agent, global: &HostObject) -> Bus {
    let bus = agent.get(MUTATION_BUS);
    let Some(original) = global.method(CONSTRUCTOR) else {
        return bus;
    };
    if original.is_wrapped() {
        return bus;
    }

    let interceptor = Interceptor::new(bus.clone());
    let target = original.clone();
    let constructor = Function::wrapping(&original, move |this, incoming| {
        let args = Args::new(incoming.to_vec());
        if let Some(callback) = args.get(0) {
            args.set(0, interceptor.wrap(&callback, CALLBACK_PREFIX, ContextSource::Fresh, None));
        }
        target.apply(this, &args)
    });
    global.set(CONSTRUCTOR, constructor);

    bus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Listener;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A constructor returning an observer that keeps its callback.
    fn install_observer(global: &HostObject) -> Function {
        let constructor = Function::new(CONSTRUCTOR, 1, |_this, args| {
            let observer = HostObject::new("observer");
            observer.set("callback", args.get(0).unwrap_or_default());
            Ok(Value::from(observer))
        });
        constructor.set_static("native", true);
        global.set(CONSTRUCTOR, constructor.clone());
        constructor
    }

    #[test]
    fn test_observer_callback_is_wrapped() {
        let agent = Agent::default();
        let window = HostObject::new("window");
        install_observer(&window);
        let bus = instrument(&agent, &window);
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        bus.on(
            "fn-end",
            Listener::new(move |_ctx, _args| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let on_mutation = Function::new("onMutation", 2, |_this, _args| Ok(Value::Undefined));
        let observer = window
            .call_method(CONSTRUCTOR, vec![Value::from(on_mutation.clone())])
            .unwrap();
        let callback = observer.as_object().unwrap().method("callback").unwrap();
        assert!(callback.original().unwrap().ptr_eq(&on_mutation));

        callback.call(&Value::Undefined, vec![]).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_constructor_keeps_metadata() {
        let agent = Agent::default();
        let window = HostObject::new("window");
        let native = install_observer(&window);
        instrument(&agent, &window);

        let replaced = window.method(CONSTRUCTOR).unwrap();
        assert!(!replaced.ptr_eq(&native));
        assert_eq!(replaced.name(), CONSTRUCTOR);
        assert_eq!(replaced.arity(), 1);
        assert!(replaced.get_static("native").is_some());

        instrument(&agent, &window);
        assert!(window.method(CONSTRUCTOR).unwrap().ptr_eq(&replaced));
    }

    #[test]
    fn test_constructor_errors_pass_through() {
        let agent = Agent::default();
        let window = HostObject::new("window");
        window.set(
            CONSTRUCTOR,
            Function::new(CONSTRUCTOR, 1, |_this, _args| {
                Err(crate::value::Exception::with_name("TypeError", "callback is not a function"))
            }),
        );
        instrument(&agent, &window);

        let err = window.call_method(CONSTRUCTOR, vec![]).unwrap_err();
        assert_eq!(err.name(), "TypeError");
    }

    #[test]
    fn test_absent_constructor_is_left_alone() {
        let agent = Agent::default();
        let window = HostObject::new("window");
        instrument(&agent, &window);

        assert!(!window.has(CONSTRUCTOR));
    }
}
