//! Timer instrumentation.
//!
//! Wraps `setTimeout`, `setImmediate`, `setInterval`, `clearTimeout` and
//! `clearImmediate` on the `"timer"` bus. A one-shot timer's callback shares the
//! context of the call that scheduled it, with `method` and `timerDuration`
//! recorded on it; interval callbacks get a fresh context per run.

use super::CALLBACK_PREFIX;
use crate::agent::Agent;
use crate::bus::{Bus, Listener, WeakBus};
use crate::context::Context;
use crate::interceptor::{ContextSource, Interceptor};
use crate::value::{Args, HostObject};
use serde_json::json;

pub const TIMER_BUS: &str = "timer";

const SET_TIMEOUT: &str = "setTimeout-";
const SET_INTERVAL: &str = "setInterval-";
const CLEAR_TIMEOUT: &str = "clearTimeout-";

/// Instrument the timer functions of `global` and return the timer bus.
pub fn instrument(agent: &Agent, global: &HostObject) -> Bus {
    let bus = agent.get(TIMER_BUS);
    let interceptor = Interceptor::new(bus.clone());

    interceptor.wrap_in_place(global, &["setTimeout", "setImmediate"], SET_TIMEOUT, ContextSource::Fresh);
    interceptor.wrap_in_place(global, &["setInterval"], SET_INTERVAL, ContextSource::Fresh);
    interceptor.wrap_in_place(global, &["clearTimeout", "clearImmediate"], CLEAR_TIMEOUT, ContextSource::Fresh);

    let weak = bus.downgrade();
    bus.on(
        &format!("{}start", SET_INTERVAL),
        Listener::new(move |_ctx, event| {
            wrap_callback(&weak, event, ContextSource::Fresh);
            Ok(())
        }),
    );

    let weak = bus.downgrade();
    bus.on(
        &format!("{}start", SET_TIMEOUT),
        Listener::new(move |ctx, event| {
            record_timer(ctx, event);
            wrap_callback(&weak, event, ContextSource::Fixed(ctx.clone()));
            Ok(())
        }),
    );

    bus
}

fn record_timer(ctx: &Context, event: &Args) {
    let duration = event
        .args_at(0)
        .and_then(|call_args| call_args.get(1))
        .and_then(|delay| delay.as_number())
        .unwrap_or(0.0);
    ctx.set("method", json!(event.str_at(2)));
    ctx.set("timerDuration", json!(duration));
}

fn wrap_callback(bus: &WeakBus, event: &Args, source: ContextSource) {
    let Some(bus) = bus.upgrade() else {
        return;
    };
    let Some(call_args) = event.args_at(0) else {
        return;
    };
    let Some(callback) = call_args.get(0) else {
        return;
    };

    let method = event.str_at(2);
    let wrapped = Interceptor::new(bus).wrap(&callback, CALLBACK_PREFIX, source, method.as_deref());
    call_args.set(0, wrapped);
}
