//! Identity-keyed context storage.
//!
//! [`ContextStore`] is a side table from anchor identity to [`Context`]. Anchors are
//! held weakly, so an entry dies with its anchor and host objects are never
//! touched. Dead entries are swept lazily as new anchors arrive.

use super::event_context::Context;
use crate::sync::lock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

const SWEEP_INTERVAL: usize = 256;

/// Identity of an anchor: its address plus a weak handle to tell a live anchor
/// from a dead one whose address was reused.
#[derive(Clone)]
pub struct AnchorKey {
    addr: usize,
    weak: Weak<dyn Any + Send + Sync>,
}

impl AnchorKey {
    pub(crate) fn of<T: Any + Send + Sync>(arc: &Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(arc);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        Self {
            addr: Arc::as_ptr(arc) as *const () as usize,
            weak,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        self.addr
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.weak.strong_count() > 0
    }
}

/// Anything with identity that can carry a context.
pub trait Anchor {
    /// The anchor's identity, or `None` for values without identity.
    fn anchor_key(&self) -> Option<AnchorKey>;
}

/// Where an emission's context comes from.
#[derive(Clone, Default)]
pub enum Scope {
    /// A brand-new context.
    #[default]
    Fresh,
    /// An existing context, passed through unchanged.
    Context(Context),
    /// The context stored for this anchor, created on first use.
    Anchor(crate::value::Value),
}

impl From<Context> for Scope {
    fn from(ctx: Context) -> Self {
        Scope::Context(ctx)
    }
}

impl From<&Context> for Scope {
    fn from(ctx: &Context) -> Self {
        Scope::Context(ctx.clone())
    }
}

impl From<Option<Context>> for Scope {
    fn from(ctx: Option<Context>) -> Self {
        ctx.map(Scope::Context).unwrap_or_default()
    }
}

impl From<crate::value::Value> for Scope {
    fn from(value: crate::value::Value) -> Self {
        Scope::Anchor(value)
    }
}

impl From<&crate::value::HostObject> for Scope {
    fn from(obj: &crate::value::HostObject) -> Self {
        Scope::Anchor(crate::value::Value::Object(obj.clone()))
    }
}

impl From<&crate::function::Function> for Scope {
    fn from(f: &crate::function::Function) -> Self {
        Scope::Anchor(crate::value::Value::Function(f.clone()))
    }
}

impl From<&crate::value::Args> for Scope {
    fn from(args: &crate::value::Args) -> Self {
        Scope::Anchor(crate::value::Value::Args(args.clone()))
    }
}

struct Entry {
    key: AnchorKey,
    context: Context,
}

#[derive(Default)]
struct Table {
    entries: HashMap<usize, Entry>,
    inserts: usize,
}

/// Side table mapping anchors to their contexts.
#[derive(Default)]
pub struct ContextStore {
    table: Mutex<Table>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context stored for `anchor`, created and stored on first access.
    ///
    /// Anchors without identity get a fresh, unstored context.
    pub fn context_for(&self, anchor: &dyn Anchor) -> Context {
        let Some(key) = anchor.anchor_key() else {
            return Context::new();
        };

        let mut table = lock(&self.table);

        if let Some(entry) = table.entries.get(&key.addr()) {
            if entry.key.is_alive() {
                return entry.context.clone();
            }
        }

        let context = Context::new();
        table.entries.insert(
            key.addr(),
            Entry {
                key,
                context: context.clone(),
            },
        );
        table.inserts += 1;
        if table.inserts % SWEEP_INTERVAL == 0 {
            table.entries.retain(|_, entry| entry.key.is_alive());
        }
        context
    }

    /// Resolve a [`Scope`] to a context.
    pub fn resolve(&self, scope: &Scope) -> Context {
        match scope {
            Scope::Fresh => Context::new(),
            Scope::Context(ctx) => ctx.clone(),
            Scope::Anchor(value) => self.context_for(value),
        }
    }

    /// Number of stored contexts whose anchors are still alive.
    pub fn len(&self) -> usize {
        lock(&self.table)
            .entries
            .values()
            .filter(|e| e.key.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
