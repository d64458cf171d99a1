use crate::context::Context;
use crate::error::Result;
use crate::value::Args;
use std::fmt;
use std::sync::Arc;

type ListenerFn = dyn Fn(&Context, &Args) -> Result<()> + Send + Sync;

/// An event listener.
///
/// Listeners are invoked with the emission's resolved context as their scope and
/// the emission's argument list. Identity is the handle: registering a clone of the
/// same `Listener` twice registers it twice, and `off` matches by identity.
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &Args) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, ctx: &Context, args: &Args) -> Result<()> {
        (self.0)(ctx, args)
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_identity() {
        let a = Listener::new(|_ctx, _args| Ok(()));
        let b = Listener::new(|_ctx, _args| Ok(()));

        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_call_forwards_context_and_args() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let listener = Listener::new(move |ctx, args| {
            ctx.set("called", serde_json::json!(true));
            seen_clone.store(args.len(), Ordering::SeqCst);
            Ok(())
        });

        let ctx = Context::new();
        listener
            .call(&ctx, &Args::new(vec![crate::value::Value::Undefined; 3]))
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(ctx.contains("called"));
    }
}
