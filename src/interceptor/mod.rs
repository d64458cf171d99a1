//! Transparent function interception.
//!
//! The [`Interceptor`] wraps host functions so each call emits `<prefix>start`,
//! then `<prefix>err` if the call throws, then `<prefix>end`, on the interceptor's
//! bus. Wrapping is invisible to the caller: the original runs with the same
//! receiver and (possibly rewritten) arguments, its result or exception is handed
//! back untouched, and name, arity and static properties stay reachable.
//!
//! # Event arguments
//!
//! | event   | args                        |
//! |---------|-----------------------------|
//! | `start` | `[call args, this, label]`  |
//! | `err`   | `[call args, this, error]`  |
//! | `end`   | `[call args, this, result]` |
//!
//! `call args` is the argument list the original receives, so `start` listeners can
//! rewrite it before the call runs.
//!
//! # Re-entrancy
//!
//! While a thread runs the listeners of one wrapper emission, emissions from other
//! wrappers of the same agent on that thread are dropped, so instrumented calls
//! made by listeners do not feed back into the bus. Interceptors built with
//! [`Interceptor::always`] are exempt. Other threads are never affected.
//!
//! # Containment
//!
//! Failures of the interceptor's own bookkeeping (a context resolver or a listener
//! returning an error) never reach the caller; they are reported as an
//! `internal-error` event on the interceptor's bus.

mod guard;
mod resolver;

pub use resolver::ContextSource;

use crate::bus::Bus;
use crate::context::{Context, Scope};
use crate::error::HookwireError;
use crate::function::Function;
use crate::value::{Args, Exception, HostObject, Value};
use guard::EmissionGuard;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Event type used to report contained faults.
pub const INTERNAL_ERROR: &str = "internal-error";

/// Prefix marker asking `wrap_in_place` to prepend each method name.
pub const METHOD_PREFIX_MARKER: char = '-';

/// Wraps functions so their calls emit lifecycle events on a bus.
#[derive(Clone, Debug)]
pub struct Interceptor {
    bus: Bus,
    always: bool,
}

impl Interceptor {
    /// An interceptor whose emissions are suppressed while another wrapper's
    /// emission is in progress.
    pub fn new(bus: Bus) -> Self {
        Self { bus, always: false }
    }

    /// An interceptor that emits even from inside another emission, and through an
    /// aborted agent.
    pub fn always(bus: Bus) -> Self {
        Self { bus, always: true }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Wrap a value if it is an unwrapped function; return it unchanged otherwise.
    ///
    /// # Arguments
    ///
    /// * `target` - The value to wrap
    /// * `prefix` - Prepended to `start`, `err` and `end` to form the event types
    /// * `source` - How each call resolves its context
    /// * `label` - Passed to `start` listeners, usually the method name
    pub fn wrap(&self, target: &Value, prefix: &str, source: ContextSource, label: Option<&str>) -> Value {
        match target {
            Value::Function(f) => Value::Function(self.wrap_function(f, prefix, source, label)),
            other => other.clone(),
        }
    }

    /// Wrap a function. An already wrapped function is returned as is.
    pub fn wrap_function(
        &self,
        original: &Function,
        prefix: &str,
        source: ContextSource,
        label: Option<&str>,
    ) -> Function {
        if original.is_wrapped() {
            return original.clone();
        }

        let interceptor = self.clone();
        let target = original.clone();
        let prefix = prefix.to_string();
        let label = label.map_or(Value::Undefined, Value::from);
        Function::wrapping(original, move |this, args| {
            interceptor.invoke(&target, &prefix, &source, &label, this, args)
        })
    }

    /// Replace the named methods of `obj` with wrapped versions.
    ///
    /// Methods that are missing, not functions, or already wrapped are skipped. If
    /// `prefix` starts with `-`, each method's name is prepended to it, so `open`
    /// with `-xhr-` emits `open-xhr-start`.
    pub fn wrap_in_place(&self, obj: &HostObject, methods: &[&str], prefix: &str, source: ContextSource) {
        let prepend_method = prefix.starts_with(METHOD_PREFIX_MARKER);

        for method in methods {
            let Some(original) = obj.method(method) else {
                continue;
            };
            if original.is_wrapped() {
                continue;
            }

            let method_prefix = if prepend_method {
                format!("{}{}", method, prefix)
            } else {
                prefix.to_string()
            };
            let wrapped = self.wrap_function(&original, &method_prefix, source.clone(), Some(method));
            obj.set(*method, wrapped);
        }
    }

    fn invoke(
        &self,
        original: &Function,
        prefix: &str,
        source: &ContextSource,
        label: &Value,
        this: &Value,
        incoming: &Args,
    ) -> Result<Value, Exception> {
        let args = Args::new(incoming.to_vec());
        let ctx = self.resolve_context(source, &args, this);

        // start listeners may rewrite args
        self.safe_emit(
            &format!("{}start", prefix),
            Args::new(vec![Value::Args(args.clone()), this.clone(), label.clone()]),
            &ctx,
        );

        let outcome = original.apply(this, &args);

        if let Err(err) = &outcome {
            self.safe_emit(
                &format!("{}err", prefix),
                Args::new(vec![Value::Args(args.clone()), this.clone(), Value::Error(err.clone())]),
                &ctx,
            );
        }

        let result = outcome.as_ref().cloned().unwrap_or(Value::Undefined);
        self.safe_emit(
            &format!("{}end", prefix),
            Args::new(vec![Value::Args(args), this.clone(), result]),
            &ctx,
        );

        outcome
    }

    fn resolve_context(&self, source: &ContextSource, args: &Args, this: &Value) -> Context {
        match source {
            ContextSource::Fresh => Context::new(),
            ContextSource::Fixed(ctx) => ctx.clone(),
            ContextSource::Resolver(resolve) => match resolve(args, this) {
                Ok(scope) => self.bus.context(scope),
                Err(err) => {
                    self.report(&err, "", args);
                    Context::new()
                }
            },
        }
    }

    fn safe_emit(&self, event_type: &str, event_args: Args, ctx: &Context) {
        let Some(core) = self.bus.core() else {
            return;
        };
        let agent = Arc::as_ptr(&core) as usize;
        if EmissionGuard::is_active(agent) && !self.always {
            return;
        }

        let outcome = {
            let _guard = EmissionGuard::enter(agent);
            self.bus.emit_with(event_type, &event_args, ctx, self.always)
        };

        if let Err(err) = outcome {
            self.report(&err, event_type, &event_args);
        }
    }

    fn report(&self, err: &HookwireError, event_type: &str, args: &Args) {
        if let Some(core) = self.bus.core() {
            core.internal_errors.fetch_add(1, Ordering::SeqCst);
        }
        debug!(error = %err, event_type, "contained interceptor fault");

        let report = Args::new(vec![
            Value::from(err.to_string()),
            Value::from(event_type),
            Value::Args(args.clone()),
        ]);
        // a failing reporter is dropped
        let _ = self.bus.emit(INTERNAL_ERROR, &report, Scope::Fresh);
    }
}
