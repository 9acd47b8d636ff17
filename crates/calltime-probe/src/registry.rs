use crate::catalog::TargetId;
use crate::epoch::{EpochCell, EpochTable};
use crate::stats::StatsTable;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Dense id of a tracked function, valid for one registration epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackedId(pub u32);

impl TrackedId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TrackedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of [`MethodRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: TrackedId,
    /// Epoch the id belongs to; pass it back when recording
    pub generation: u64,
    /// False when the target was already registered in this epoch
    pub newly_registered: bool,
}

/// Assigns dense ids to targets and remembers their display names.
///
/// Registration is serialized on a single lock and publishes a new epoch
/// table with one atomic swap; lookups never take the lock.
pub struct MethodRegistry {
    epoch: Arc<EpochCell>,
    grow: Mutex<()>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        MethodRegistry {
            epoch: Arc::new(EpochCell::new()),
            grow: Mutex::new(()),
        }
    }

    /// Stats table backed by this registry's epoch
    pub fn stats(&self) -> StatsTable {
        StatsTable::new(self.epoch.clone())
    }

    /// Register a target, or return its existing id.
    ///
    /// Identity decides sameness: two targets with the same name get
    /// different ids.
    pub fn register(&self, target: TargetId, name: impl Into<Arc<str>>) -> Registration {
        let _guard = self.grow.lock();
        let current = self.epoch.load_full();

        if let Some(&id) = current.index.get(&target) {
            return Registration {
                id,
                generation: current.generation,
                newly_registered: false,
            };
        }

        let name = name.into();
        let (next, id) = current.with_target(target, name.clone());
        self.epoch.publish(next);
        debug!(target_id = %target, %id, name = &*name, generation = current.generation, "registered target");

        Registration {
            id,
            generation: current.generation,
            newly_registered: true,
        }
    }

    /// Id of a target in the current epoch
    #[inline]
    pub fn id_of(&self, target: TargetId) -> Option<TrackedId> {
        self.epoch.load().index.get(&target).copied()
    }

    /// Id and generation of a target, read from one consistent table
    #[inline]
    pub fn lookup(&self, target: TargetId) -> Option<(u64, TrackedId)> {
        let table = self.epoch.load();
        table.index.get(&target).map(|&id| (table.generation, id))
    }

    pub fn name_of(&self, id: TrackedId) -> Option<Arc<str>> {
        self.epoch.load().names.get(id.index()).cloned()
    }

    /// Number of targets registered in the current epoch
    pub fn count(&self) -> usize {
        self.epoch.load().names.len()
    }

    pub fn generation(&self) -> u64 {
        self.epoch.load().generation
    }

    /// All `(id, name)` pairs in id order
    pub fn tracked(&self) -> Vec<(TrackedId, Arc<str>)> {
        self.epoch
            .load()
            .names
            .iter()
            .enumerate()
            .map(|(idx, name)| (TrackedId(idx as u32), name.clone()))
            .collect()
    }

    /// Drop every id, name and counter and start a new epoch.
    ///
    /// Returns the new generation.
    pub fn clear(&self) -> u64 {
        let _guard = self.grow.lock();
        let generation = self.epoch.load().generation + 1;
        self.epoch.publish(EpochTable::empty(generation));
        debug!(generation, "started new registration epoch");
        generation
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
