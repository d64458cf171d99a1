use crate::context::{Context, Scope};
use crate::error::Result;
use crate::value::{Args, Value};
use std::sync::Arc;

type ResolverFn = dyn Fn(&Args, &Value) -> Result<Scope> + Send + Sync;

/// How a wrapped call picks its context.
///
/// The context is resolved once per invocation, before `start`, and shared by
/// the invocation's `start`, `err` and `end` events.
#[derive(Clone, Default)]
pub enum ContextSource {
    /// A new context for every call.
    #[default]
    Fresh,
    /// The same context for every call.
    Fixed(Context),
    /// Ask the caller, given the call's arguments and receiver; the returned scope
    /// is resolved through the agent's context store.
    Resolver(Arc<ResolverFn>),
}

impl ContextSource {
    /// Resolve contexts from a closure over `(args, this)`.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(&Args, &Value) -> Result<Scope> + Send + Sync + 'static,
    {
        ContextSource::Resolver(Arc::new(f))
    }

    /// Anchor each call's context on its receiver.
    pub fn receiver() -> Self {
        Self::resolver(|_args, this| Ok(Scope::Anchor(this.clone())))
    }
}

impl From<Context> for ContextSource {
    fn from(ctx: Context) -> Self {
        ContextSource::Fixed(ctx)
    }
}

impl From<Option<Context>> for ContextSource {
    fn from(ctx: Option<Context>) -> Self {
        ctx.map(ContextSource::Fixed).unwrap_or_default()
    }
}
