//! Per-thread re-entrancy tracking for wrapper emissions.
//!
//! A thread is "inside an emission" of an agent while an [`EmissionGuard`] for that
//! agent is alive on it. Other threads are unaffected, and the mark is cleared on
//! drop, including when a listener panics and the unwind is caught upstream.

use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
    static ACTIVE: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

pub(crate) struct EmissionGuard {
    agent: usize,
    entered: bool,
}

impl EmissionGuard {
    /// Whether the current thread is inside an emission for `agent`.
    pub(crate) fn is_active(agent: usize) -> bool {
        ACTIVE.with(|active| active.borrow().contains(&agent))
    }

    /// Mark the current thread as inside an emission for `agent`.
    ///
    /// Nested guards for the same agent leave the mark to the outermost one.
    pub(crate) fn enter(agent: usize) -> Self {
        let entered = ACTIVE.with(|active| active.borrow_mut().insert(agent));
        Self { agent, entered }
    }
}

impl Drop for EmissionGuard {
    fn drop(&mut self) {
        if self.entered {
            let _ = ACTIVE.try_with(|active| active.borrow_mut().remove(&self.agent));
        }
    }
}
