//! Stable numeric ids for host objects.
//!
//! Feature code uses these ids to key per-object state in payloads. Ids start at 1;
//! 0 is reserved for the designated global object and -1 is returned for values
//! without identity.

use crate::context::{Anchor, AnchorKey};
use crate::sync::lock;
use std::collections::HashMap;
use std::sync::Mutex;

/// Id returned for values that cannot carry one.
pub const NO_ID: i64 = -1;

/// Id of the designated global object.
pub const GLOBAL_ID: i64 = 0;

const SWEEP_INTERVAL: i64 = 256;

struct IdTable {
    ids: HashMap<usize, (AnchorKey, i64)>,
    next: i64,
    global: Option<AnchorKey>,
}

/// Side table assigning ids on first request.
pub struct ObjectIds {
    table: Mutex<IdTable>,
}

impl ObjectIds {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(IdTable {
                ids: HashMap::new(),
                next: 1,
                global: None,
            }),
        }
    }

    /// Designate `global` as the object with id 0.
    pub fn set_global(&self, global: &dyn Anchor) {
        lock(&self.table).global = global.anchor_key();
    }

    /// The id of `value`, assigning the next one if it has none yet.
    pub fn id_of(&self, value: &dyn Anchor) -> i64 {
        let Some(key) = value.anchor_key() else {
            return NO_ID;
        };

        let mut table = lock(&self.table);
        if let Some(global) = &table.global {
            if global.is_alive() && global.addr() == key.addr() {
                return GLOBAL_ID;
            }
        }

        if let Some((existing, id)) = table.ids.get(&key.addr()) {
            if existing.is_alive() {
                return *id;
            }
        }

        let id = table.next;
        table.next += 1;
        if id % SWEEP_INTERVAL == 0 {
            table.ids.retain(|_, (k, _)| k.is_alive());
        }
        table.ids.insert(key.addr(), (key, id));
        id
    }
}

impl Default for ObjectIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{HostObject, Value};

    #[test]
    fn test_ids_start_at_one_and_are_stable() {
        let ids = ObjectIds::new();
        let a = HostObject::new("a");
        let b = HostObject::new("b");

        assert_eq!(ids.id_of(&a), 1);
        assert_eq!(ids.id_of(&b), 2);
        assert_eq!(ids.id_of(&a), 1);
    }

    #[test]
    fn test_data_has_no_id() {
        let ids = ObjectIds::new();
        assert_eq!(ids.id_of(&Value::from(3i64)), NO_ID);
        assert_eq!(ids.id_of(&Value::Undefined), NO_ID);
    }

    #[test]
    fn test_global_is_zero_without_consuming_an_id() {
        let ids = ObjectIds::new();
        let window = HostObject::new("window");
        ids.set_global(&window);

        assert_eq!(ids.id_of(&window), GLOBAL_ID);
        assert_eq!(ids.id_of(&HostObject::new("x")), 1);
    }

    #[test]
    fn test_dead_anchor_id_is_not_reused() {
        let ids = ObjectIds::new();
        {
            let temp = HostObject::new("temp");
            assert_eq!(ids.id_of(&temp), 1);
        }
        let next = HostObject::new("next");
        assert_eq!(ids.id_of(&next), 2);
    }

    #[test]
    fn test_dead_entries_are_swept_periodically() {
        let ids = ObjectIds::new();
        let keep = HostObject::new("keep");
        assert_eq!(ids.id_of(&keep), 1);

        for _ in 0..(SWEEP_INTERVAL * 3) {
            ids.id_of(&HostObject::new("transient"));
        }

        assert!(ids.table.lock().unwrap().ids.len() <= SWEEP_INTERVAL as usize + 1);
        assert_eq!(ids.id_of(&keep), 1);
    }
}
