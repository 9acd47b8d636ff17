//! Registration epoch shared by the registry and the stats table.

use crate::catalog::TargetId;
use crate::registry::TrackedId;
use crate::stats::AggregateStat;
use arc_swap::{ArcSwap, Guard};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable view of one epoch's registrations.
///
/// `names` and `slots` always have the same length; index `i` belongs to
/// `TrackedId(i)`. A new table is published for every registration, sharing
/// the existing slots so counters survive growth.
#[derive(Debug, Default, Clone)]
pub(crate) struct EpochTable {
    pub generation: u64,
    pub names: Vec<Arc<str>>,
    pub slots: Vec<Arc<AggregateStat>>,
    pub index: HashMap<TargetId, TrackedId>,
}

impl EpochTable {
    pub fn empty(generation: u64) -> Self {
        EpochTable {
            generation,
            ..Default::default()
        }
    }

    /// Copy of this table with one more target appended
    pub fn with_target(&self, target: TargetId, name: Arc<str>) -> (Self, TrackedId) {
        let id = TrackedId(self.slots.len() as u32);
        let mut next = self.clone();
        next.names.push(name);
        next.slots.push(Arc::new(AggregateStat::default()));
        next.index.insert(target, id);
        (next, id)
    }
}

/// Atomically swappable pointer to the current epoch table
#[derive(Debug)]
pub(crate) struct EpochCell {
    current: ArcSwap<EpochTable>,
}

impl EpochCell {
    pub fn new() -> Self {
        EpochCell {
            current: ArcSwap::from_pointee(EpochTable::empty(0)),
        }
    }

    #[inline]
    pub fn load(&self) -> Guard<Arc<EpochTable>> {
        self.current.load()
    }

    pub fn load_full(&self) -> Arc<EpochTable> {
        self.current.load_full()
    }

    pub fn publish(&self, table: EpochTable) {
        self.current.store(Arc::new(table));
    }
}
