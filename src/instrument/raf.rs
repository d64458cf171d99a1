//! Animation-frame instrumentation.
//!
//! Wraps `requestAnimationFrame` and its vendor-prefixed variants on the `"raf"`
//! bus; each frame callback is wrapped with the `fn-` prefix.

use super::CALLBACK_PREFIX;
use crate::agent::Agent;
use crate::bus::{Bus, Listener};
use crate::interceptor::{ContextSource, Interceptor};
use crate::value::HostObject;

pub const RAF_BUS: &str = "raf";

const METHODS: [&str; 4] = [
    "requestAnimationFrame",
    "mozRequestAnimationFrame",
    "webkitRequestAnimationFrame",
    "msRequestAnimationFrame",
];

/// Instrument the animation-frame functions of `global` and return the raf bus.
pub fn instrument(agent: &Agent, global: &HostObject) -> Bus {
    let bus = agent.get(RAF_BUS);
    Interceptor::new(bus.clone()).wrap_in_place(global, &METHODS, "raf-", ContextSource::Fresh);

    let weak = bus.downgrade();
    bus.on(
        "raf-start",
        Listener::new(move |_ctx, event| {
            let (Some(bus), Some(call_args)) = (weak.upgrade(), event.args_at(0)) else {
                return Ok(());
            };
            if let Some(callback) = call_args.get(0) {
                let wrapped = Interceptor::new(bus).wrap(&callback, CALLBACK_PREFIX, ContextSource::Fresh, None);
                call_args.set(0, wrapped);
            }
            Ok(())
        }),
    );

    bus
}
