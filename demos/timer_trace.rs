//! Timer tracing demonstration
//!
//! This example instruments a simulated page global's timer functions, schedules
//! a few callbacks and runs them from a small event loop. Every callback run is
//! reported with the context of the `setTimeout` call that scheduled it, so the
//! delay recorded at scheduling time is visible when the callback fires.
//!
//! # Running the example
//!
//! ```bash
//! RUST_LOG=debug cargo run --example timer_trace
//! ```

use hookwire::config::FLAG_DEV;
use hookwire::diagnostics;
use hookwire::instrument::timer;
use hookwire::prelude::*;
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    diagnostics::init_tracing();

    println!("{}", "=".repeat(80));
    println!("Timer Tracing Demonstration");
    println!("{}", "=".repeat(80));
    println!();

    let agent = Agent::new(LoaderConfig::default().with_flag(FLAG_DEV));
    diagnostics::install(&agent);

    // A stand-in for the page global: timers queue their callbacks
    let window = HostObject::new("window");
    let queue: Arc<Mutex<Vec<Function>>> = Arc::new(Mutex::new(Vec::new()));
    let pending = Arc::clone(&queue);
    window.set(
        "setTimeout",
        Function::new("setTimeout", 2, move |_this, args| {
            let mut pending = pending.lock().unwrap();
            if let Some(callback) = args.function_at(0) {
                pending.push(callback);
            }
            Ok(Value::from(pending.len() as i64))
        }),
    );

    let bus = timer::instrument(&agent, &window);
    bus.on(
        "setTimeout-start",
        Listener::new(|ctx, _args| {
            println!("  scheduled  [{}]", ctx.correlation_id());
            Ok(())
        }),
    );
    bus.on(
        "fn-end",
        Listener::new(|ctx, _args| {
            println!(
                "  ran        [{}] method={} delay={}",
                ctx.correlation_id(),
                ctx.get("method").unwrap_or_default(),
                ctx.get("timerDuration").unwrap_or_default(),
            );
            Ok(())
        }),
    );

    println!("Scheduling callbacks...");
    for delay in [0i64, 100, 250] {
        let callback = Function::new("tick", 0, move |_this, _args| Ok(Value::from(delay)));
        window.call_method("setTimeout", vec![Value::from(callback), Value::from(delay)])?;
    }

    let failing = Function::new("broken", 0, |_this, _args| Err(Exception::new("callback failed")));
    window.call_method("setTimeout", vec![Value::from(failing)])?;

    println!();
    println!("Running the event loop...");
    let callbacks: Vec<Function> = queue.lock().unwrap().drain(..).collect();
    for callback in callbacks {
        if let Err(err) = callback.call(&Value::Undefined, vec![]) {
            println!("  callback threw: {}", err);
        }
    }

    println!();
    println!("Internal errors: {}", agent.internal_error_count());

    Ok(())
}
