//! Aggregated per-function call statistics.
//!
//! Counters live in one [`AggregateStat`] per tracked id and are updated with
//! atomics only, so recording never blocks and readers never stop writers.
//! A snapshot reads each counter on its own; counters of the same function
//! may be one call apart from each other in a snapshot taken under load.

use crate::clock::ticks_to_duration;
use crate::epoch::EpochCell;
use crate::registry::TrackedId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters for one tracked function
#[derive(Debug, Default)]
pub struct AggregateStat {
    calls: AtomicU64,
    total_ticks: AtomicU64,
    max_ticks: AtomicU64,
    exceptions: AtomicU64,
}

/// Plain copy of the four counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawStat {
    pub calls: u64,
    pub total_ticks: u64,
    pub max_ticks: u64,
    pub exceptions: u64,
}

impl AggregateStat {
    #[inline]
    pub fn record(&self, elapsed_ticks: u64, faulted: bool) {
        self.calls.fetch_add(1, Ordering::Release);
        self.total_ticks.fetch_add(elapsed_ticks, Ordering::Release);
        if faulted {
            self.exceptions.fetch_add(1, Ordering::Release);
        }

        let mut current = self.max_ticks.load(Ordering::Acquire);
        while elapsed_ticks > current {
            match self.max_ticks.compare_exchange_weak(
                current,
                elapsed_ticks,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn load(&self) -> RawStat {
        RawStat {
            calls: self.calls.load(Ordering::Acquire),
            total_ticks: self.total_ticks.load(Ordering::Acquire),
            max_ticks: self.max_ticks.load(Ordering::Acquire),
            exceptions: self.exceptions.load(Ordering::Acquire),
        }
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::Release);
        self.total_ticks.store(0, Ordering::Release);
        self.max_ticks.store(0, Ordering::Release);
        self.exceptions.store(0, Ordering::Release);
    }

    /// Read and zero every counter; updates racing with this land either in
    /// the returned values or in the next period, never in neither.
    pub fn take(&self) -> RawStat {
        RawStat {
            calls: self.calls.swap(0, Ordering::AcqRel),
            total_ticks: self.total_ticks.swap(0, Ordering::AcqRel),
            max_ticks: self.max_ticks.swap(0, Ordering::AcqRel),
            exceptions: self.exceptions.swap(0, Ordering::AcqRel),
        }
    }
}

/// One function's statistics inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRow {
    pub id: TrackedId,
    pub name: Arc<str>,
    pub calls: u64,
    pub total: Duration,
    pub max: Duration,
    pub exceptions: u64,
    pub total_ticks: u64,
    pub max_ticks: u64,
}

impl StatRow {
    fn new(id: TrackedId, name: Arc<str>, raw: RawStat) -> Self {
        StatRow {
            id,
            name,
            calls: raw.calls,
            total: ticks_to_duration(raw.total_ticks),
            max: ticks_to_duration(raw.max_ticks),
            exceptions: raw.exceptions,
            total_ticks: raw.total_ticks,
            max_ticks: raw.max_ticks,
        }
    }

    /// Average time per call
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            ticks_to_duration(self.total_ticks / self.calls)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.calls == 0 && self.total_ticks == 0 && self.max_ticks == 0 && self.exceptions == 0
    }
}

/// Immutable copy of every tracked function's statistics.
///
/// Rows are ordered by total time, largest first; equal totals keep id order.
#[derive(Debug, Clone, Default)]
pub struct StatSnapshot {
    generation: u64,
    rows: Vec<StatRow>,
}

impl StatSnapshot {
    fn new(generation: u64, mut rows: Vec<StatRow>) -> Self {
        rows.sort_by(|a, b| b.total_ticks.cmp(&a.total_ticks).then(a.id.cmp(&b.id)));
        StatSnapshot { generation, rows }
    }

    /// Epoch the snapshot was taken in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rows(&self) -> &[StatRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: TrackedId) -> Option<&StatRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn total_calls(&self) -> u64 {
        self.rows.iter().map(|row| row.calls).sum()
    }
}

impl IntoIterator for StatSnapshot {
    type Item = StatRow;
    type IntoIter = std::vec::IntoIter<StatRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Per-id statistics table sharing its epoch with a [`MethodRegistry`].
///
/// Grows implicitly when the registry assigns a new id.
///
/// [`MethodRegistry`]: crate::registry::MethodRegistry
#[derive(Clone)]
pub struct StatsTable {
    epoch: Arc<EpochCell>,
}

impl StatsTable {
    pub(crate) fn new(epoch: Arc<EpochCell>) -> Self {
        StatsTable { epoch }
    }

    /// Number of ids in the current epoch
    pub fn len(&self) -> usize {
        self.epoch.load().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation of the epoch the table currently belongs to
    pub fn generation(&self) -> u64 {
        self.epoch.load().generation
    }

    /// Record one call against `id` as registered in epoch `generation`.
    ///
    /// Returns false, leaving every counter untouched, when that epoch has
    /// been cleared or `id` is not registered in it.
    #[inline]
    pub fn record_in(
        &self,
        generation: u64,
        id: TrackedId,
        elapsed_ticks: i64,
        faulted: bool,
    ) -> bool {
        let table = self.epoch.load();
        if table.generation != generation {
            return false;
        }
        match table.slots.get(id.index()) {
            Some(slot) => {
                slot.record(elapsed_ticks.max(0) as u64, faulted);
                true
            }
            None => false,
        }
    }

    /// Current counters for one id
    pub fn get(&self, id: TrackedId) -> Option<StatRow> {
        let table = self.epoch.load();
        let slot = table.slots.get(id.index())?;
        Some(StatRow::new(id, table.names[id.index()].clone(), slot.load()))
    }

    /// Copy all counters without resetting them
    pub fn snapshot(&self) -> StatSnapshot {
        let table = self.epoch.load();
        let rows = table
            .slots
            .iter()
            .zip(&table.names)
            .enumerate()
            .map(|(idx, (slot, name))| StatRow::new(TrackedId(idx as u32), name.clone(), slot.load()))
            .collect();
        StatSnapshot::new(table.generation, rows)
    }

    /// Zero every counter of every id
    pub fn reset(&self) {
        let table = self.epoch.load();
        for slot in &table.slots {
            slot.reset();
        }
    }

    /// Snapshot and reset in one pass, without losing concurrent updates
    pub fn drain(&self) -> StatSnapshot {
        let table = self.epoch.load();
        let rows = table
            .slots
            .iter()
            .zip(&table.names)
            .enumerate()
            .map(|(idx, (slot, name))| StatRow::new(TrackedId(idx as u32), name.clone(), slot.take()))
            .collect();
        StatSnapshot::new(table.generation, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TargetId;
    use crate::registry::MethodRegistry;

    fn table_with(names: &[&str]) -> (MethodRegistry, StatsTable) {
        let registry = MethodRegistry::new();
        for (i, name) in names.iter().enumerate() {
            registry.register(TargetId(i as u64 + 100), *name);
        }
        let stats = registry.stats();
        (registry, stats)
    }

    #[test]
    fn test_record_updates_all_counters() {
        let (_registry, stats) = table_with(&["a"]);
        assert!(stats.record_in(0, TrackedId(0), 30, false));
        assert!(stats.record_in(0, TrackedId(0), 50, false));
        assert!(stats.record_in(0, TrackedId(0), 20, false));

        let row = stats.get(TrackedId(0)).unwrap();
        assert_eq!(row.calls, 3);
        assert_eq!(row.total_ticks, 100);
        assert_eq!(row.max_ticks, 50);
        assert_eq!(row.exceptions, 0);
        assert_eq!(row.mean(), Duration::from_nanos(33));
    }

    #[test]
    fn test_faulted_record_counts_like_normal_call() {
        let (_registry, stats) = table_with(&["a"]);
        stats.record_in(0, TrackedId(0), 10, false);
        stats.record_in(0, TrackedId(0), 70, true);

        let row = stats.get(TrackedId(0)).unwrap();
        assert_eq!(row.calls, 2);
        assert_eq!(row.total_ticks, 80);
        assert_eq!(row.max_ticks, 70);
        assert_eq!(row.exceptions, 1);
    }

    #[test]
    fn test_negative_elapsed_clamped() {
        let (_registry, stats) = table_with(&["a"]);
        stats.record_in(0, TrackedId(0), -500, false);

        let row = stats.get(TrackedId(0)).unwrap();
        assert_eq!(row.calls, 1);
        assert_eq!(row.total_ticks, 0);
        assert_eq!(row.max_ticks, 0);
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let (_registry, stats) = table_with(&["a"]);
        assert!(!stats.record_in(0, TrackedId(5), 10, false));
        assert_eq!(stats.snapshot().total_calls(), 0);
    }

    #[test]
    fn test_snapshot_sorted_by_total_then_id() {
        let (_registry, stats) = table_with(&["a", "b", "c", "d"]);
        stats.record_in(0, TrackedId(0), 10, false);
        stats.record_in(0, TrackedId(1), 40, false);
        stats.record_in(0, TrackedId(2), 10, false);
        stats.record_in(0, TrackedId(3), 25, false);

        let order: Vec<u32> = stats.snapshot().rows().iter().map(|r| r.id.0).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_snapshot_then_reset_yields_zeros() {
        let (_registry, stats) = table_with(&["a", "b"]);
        stats.record_in(0, TrackedId(0), 10, true);
        stats.record_in(0, TrackedId(1), 20, false);

        let first = stats.snapshot();
        assert_eq!(first.total_calls(), 2);
        stats.reset();

        let second = stats.snapshot();
        assert_eq!(second.len(), 2);
        assert!(second.rows().iter().all(StatRow::is_zero));
        // earlier snapshot is unaffected
        assert_eq!(first.get(TrackedId(0)).unwrap().exceptions, 1);
    }

    #[test]
    fn test_drain_resets() {
        let (_registry, stats) = table_with(&["a"]);
        stats.record_in(0, TrackedId(0), 5, false);

        let drained = stats.drain();
        assert_eq!(drained.get(TrackedId(0)).unwrap().calls, 1);
        assert!(stats.snapshot().rows().iter().all(StatRow::is_zero));
    }

    #[test]
    fn test_snapshot_carries_names() {
        let (_registry, stats) = table_with(&["Bar.Execute()", "Bar.Execute(Int32)"]);
        let snap = stats.snapshot();
        assert_eq!(&*snap.get(TrackedId(1)).unwrap().name, "Bar.Execute(Int32)");
    }

    #[test]
    fn test_old_id_rejected_after_clear() {
        let (registry, stats) = table_with(&["old"]);
        let old = registry.register(TargetId(100), "old");

        registry.clear();
        let new = registry.register(TargetId(200), "new");
        assert_eq!(new.id, old.id);

        assert!(!stats.record_in(old.generation, old.id, 500, false));
        let row = stats.get(new.id).unwrap();
        assert_eq!(&*row.name, "new");
        assert!(row.is_zero());

        assert!(stats.record_in(new.generation, new.id, 5, false));
        assert_eq!(stats.get(new.id).unwrap().calls, 1);
    }
}
