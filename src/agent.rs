//! The agent registry.
//!
//! An [`Agent`] owns everything the core shares between components: the root bus
//! and the bus-by-name cache, the event backlog, the abort switch, the context and
//! id side tables, the clock and the configuration. The emission re-entrancy guard
//! is per thread and lives with the interceptor, not here.
//! Independent agents share nothing, and dropping the last handle to an agent
//! tears all of it down; buses and wrappers that outlive it become inert.
//!
//! # Lifecycle
//!
//! An agent starts **active**. [`Agent::abort`] moves it to **aborted** if buffered
//! data is still waiting for a consumer; this is terminal. The timeout collaborator
//! triggers it through [`Agent::schedule_abort`].

use crate::bus::{Bus, EventBuffer};
use crate::clock::{Clock, SystemClock};
use crate::config::LoaderConfig;
use crate::context::{Anchor, Context, ContextStore};
use crate::ids::ObjectIds;
use crate::interceptor::Interceptor;
use crate::sync::lock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Groups whose presence means a consumer was expected but never attached.
const WAITING_GROUPS: [&str; 2] = ["api", "feature"];

pub(crate) struct Core {
    pub(crate) root: Bus,
    pub(crate) buses: Mutex<HashMap<String, Bus>>,
    pub(crate) backlog: EventBuffer,
    pub(crate) contexts: ContextStore,
    pub(crate) ids: ObjectIds,
    pub(crate) internal_errors: AtomicUsize,
    aborted: AtomicBool,
    features: Mutex<BTreeSet<String>>,
    clock: Arc<dyn Clock>,
    config: LoaderConfig,
}

impl Core {
    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn abort(&self) -> bool {
        if !WAITING_GROUPS.iter().any(|g| self.backlog.has_group(g)) {
            return false;
        }
        self.aborted.store(true, Ordering::SeqCst);
        let discarded = self.backlog.total_len();
        self.backlog.clear();
        info!(discarded, "agent aborted, buffered events discarded");
        true
    }
}

/// Handle to an agent instance.
///
/// Cloning yields another handle to the same agent.
#[derive(Clone)]
pub struct Agent {
    core: Arc<Core>,
}

impl Agent {
    /// Create an agent with the system clock.
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create an agent with a specific clock.
    pub fn with_clock(config: LoaderConfig, clock: Arc<dyn Clock>) -> Self {
        let features = config.features.clone();
        let core = Arc::new_cyclic(|weak| Core {
            root: Bus::root(weak.clone()),
            buses: Mutex::new(HashMap::new()),
            backlog: EventBuffer::new(),
            contexts: ContextStore::new(),
            ids: ObjectIds::new(),
            internal_errors: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            features: Mutex::new(features),
            clock,
            config,
        });
        debug!("agent created");
        Self { core }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.core.config
    }

    /// The anonymous root bus.
    pub fn root(&self) -> Bus {
        self.core.root.clone()
    }

    /// Get or create the named child bus of the root.
    pub fn get(&self, name: &str) -> Bus {
        self.core.root.get(name)
    }

    /// An interceptor emitting on the named bus.
    pub fn interceptor(&self, name: &str) -> Interceptor {
        Interceptor::new(self.get(name))
    }

    /// The backlog of buffered events, for the transport collaborator.
    pub fn backlog(&self) -> &EventBuffer {
        &self.core.backlog
    }

    /// Abandon buffered data if the consumer never attached.
    ///
    /// If an `"api"` or `"feature"` group still exists, marks the agent aborted and
    /// discards every buffer group. From then on, emissions are dropped unless
    /// forced. Returns whether the abort took effect.
    pub fn abort(&self) -> bool {
        self.core.abort()
    }

    pub fn is_aborted(&self) -> bool {
        self.core.is_aborted()
    }

    /// Attempt [`Agent::abort`] once, after the configured delay.
    ///
    /// Must be called from within a tokio runtime. The task holds no strong
    /// reference to the agent; if the agent is gone by then it does nothing. The
    /// task resolves to whether the abort took effect.
    pub fn schedule_abort(&self) -> JoinHandle<bool> {
        let delay = self.core.config.abort_after();
        let core = Arc::downgrade(&self.core);
        debug!(delay_ms = delay.as_millis() as u64, "abort scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            core.upgrade().map(|core| core.abort()).unwrap_or(false)
        })
    }

    /// Milliseconds since the agent's clock origin.
    pub fn now(&self) -> u64 {
        self.core.clock.now()
    }

    /// Wall-clock time of the clock origin, in Unix milliseconds.
    pub fn offset(&self) -> i64 {
        self.core.clock.offset()
    }

    pub fn xhr_wrappable(&self) -> bool {
        self.core.config.xhr_wrappable
    }

    pub fn enable_feature(&self, feature: impl Into<String>) {
        lock(&self.core.features).insert(feature.into());
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        lock(&self.core.features).contains(feature)
    }

    pub fn features(&self) -> BTreeSet<String> {
        lock(&self.core.features).clone()
    }

    /// The context stored for `anchor`, created on first access.
    pub fn context_for(&self, anchor: &dyn Anchor) -> Context {
        self.core.contexts.context_for(anchor)
    }

    /// A brand-new context, shared with nothing.
    pub fn fresh_context(&self) -> Context {
        Context::new()
    }

    /// Designate the object that gets id 0.
    pub fn set_global(&self, global: &dyn Anchor) {
        self.core.ids.set_global(global);
    }

    /// Stable id of an object: 0 for the global, -1 for values without identity.
    pub fn id_of(&self, value: &dyn Anchor) -> i64 {
        self.core.ids.id_of(value)
    }

    /// Number of contained faults reported so far.
    pub fn internal_error_count(&self) -> usize {
        self.core.internal_errors.load(Ordering::SeqCst)
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}
