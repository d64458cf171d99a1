//! Event buffering by named group.
//!
//! This module provides the [`EventBuffer`], the backlog that holds events of
//! interest emitted before their consumer exists. A late-loading consumer reads or
//! takes a group and replays it.

use crate::context::Context;
use crate::sync::lock;
use crate::value::Args;
use chrono::{DateTime, Local, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// One recorded emission.
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    /// Name of the bus the event was emitted on, `None` for the root bus
    pub bus: Option<String>,
    /// The event type
    pub event_type: String,
    /// The exact argument list passed at emission time
    pub args: Args,
    /// The resolved context, after listeners ran
    pub context: Context,
    /// Wall-clock time the event was recorded
    pub recorded_at: DateTime<Utc>,
}

impl BufferedEvent {
    /// Get a formatted one-line summary of the event
    pub fn printable_summary(&self) -> String {
        let time_str = self.recorded_at.with_timezone(&Local).format("%H:%M:%S%.3f");
        let arg_count = self.args.len();
        let plural = if arg_count != 1 { "s" } else { "" };
        format!(
            "[{}] {}:{} (context: {}, {} arg{})",
            time_str,
            self.bus.as_deref().unwrap_or("root"),
            self.event_type,
            self.context.correlation_id(),
            arg_count,
            plural
        )
    }
}

/// Backlog of buffered events, keyed by group name.
///
/// A group exists from the moment it is declared until it is taken by its
/// consumer or discarded by an abort. Events are only recorded into groups that
/// exist.
#[derive(Default)]
pub struct EventBuffer {
    groups: Mutex<HashMap<String, Vec<BufferedEvent>>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the group if it does not exist yet.
    pub fn declare(&self, group: &str) {
        lock(&self.groups).entry(group.to_string()).or_default();
    }

    /// Whether the group exists, i.e. was declared and not yet taken.
    pub fn has_group(&self, group: &str) -> bool {
        lock(&self.groups).contains_key(group)
    }

    /// Append an event to an existing group.
    ///
    /// Returns `false` if the group does not exist.
    pub fn push(&self, group: &str, event: BufferedEvent) -> bool {
        match lock(&self.groups).get_mut(group) {
            Some(events) => {
                events.push(event);
                true
            }
            None => false,
        }
    }

    /// Snapshot of a group's events in emission order.
    pub fn group(&self, group: &str) -> Option<Vec<BufferedEvent>> {
        lock(&self.groups).get(group).cloned()
    }

    /// Remove a group and return its events.
    ///
    /// This is how a consumer attaches: once taken, the group no longer records.
    pub fn take(&self, group: &str) -> Option<Vec<BufferedEvent>> {
        lock(&self.groups).remove(group)
    }

    /// Names of all existing groups, sorted.
    pub fn groups(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.groups).keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of events in a group, 0 if it does not exist.
    pub fn len(&self, group: &str) -> usize {
        lock(&self.groups).get(group).map(Vec::len).unwrap_or(0)
    }

    /// Total number of events across all groups.
    pub fn total_len(&self) -> usize {
        lock(&self.groups).values().map(Vec::len).sum()
    }

    /// Check whether no group holds any event
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Count events in a group matching a filter
    ///
    /// # Arguments
    ///
    /// * `group` - The group to count in
    /// * `filter_func` - Custom filter function to apply to events
    #[allow(clippy::type_complexity)]
    pub fn count_events(
        &self,
        group: &str,
        filter_func: Option<&dyn Fn(&BufferedEvent) -> bool>,
    ) -> usize {
        let groups = lock(&self.groups);
        let Some(events) = groups.get(group) else {
            return 0;
        };

        match filter_func {
            Some(filter) => events.iter().filter(|e| filter(e)).count(),
            None => events.len(),
        }
    }

    /// Get the last N event summaries of a group
    ///
    /// # Arguments
    ///
    /// * `group` - The group to read
    /// * `n` - Number of events to return
    pub fn last_n_summaries(&self, group: &str, n: usize) -> Vec<String> {
        let groups = lock(&self.groups);
        let Some(events) = groups.get(group) else {
            return Vec::new();
        };

        let start_idx = events.len().saturating_sub(n);
        events[start_idx..].iter().map(BufferedEvent::printable_summary).collect()
    }

    /// Discard every group and its events.
    pub fn clear(&self) {
        lock(&self.groups).clear();
    }
}
