//! [`History`]: an ordered, timestamp-keyed collection of
//! [`Snapshot`](crate::snapshot::Snapshot)s.
//!
//! Backed by a `BTreeMap` keyed by timestamp rather than a deque plus binary
//! search: both give O(log n) lookup, but since retention here is driven by
//! an externally supplied `gc_ts` rather than a fixed window, the map makes
//! "retain everything at or after some ts" a single `split_off`.
use std::{
    collections::BTreeMap,
    sync::Arc,
};

use crate::{
    ids::Timestamp,
    snapshot::Snapshot,
};

pub struct History {
    snapshots: BTreeMap<Timestamp, Arc<Snapshot>>,
}

impl History {
    pub fn new(initial: Snapshot) -> Self {
        let mut snapshots = BTreeMap::new();
        snapshots.insert(initial.current_ts(), Arc::new(initial));
        Self { snapshots }
    }

    /// Appends a new snapshot. The caller is responsible for ensuring
    /// `snapshot.current_ts()` is strictly greater than every previously
    /// appended timestamp; `Storage` enforces this serially.
    pub fn append(&mut self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.current_ts(), Arc::new(snapshot));
    }

    /// The most recent snapshot whose timestamp is less than or equal to
    /// `ts`, or `None` if every retained snapshot postdates `ts` (already GC'd
    /// away, or simply never ingested).
    pub fn lookup(&self, ts: Timestamp) -> Option<Arc<Snapshot>> {
        self.snapshots.range(..=ts).next_back().map(|(_, s)| s.clone())
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.snapshots
            .values()
            .next_back()
            .expect("History always holds at least one snapshot")
            .clone()
    }

    pub fn latest_ts(&self) -> Timestamp {
        *self.snapshots.keys().next_back().expect("History always holds at least one snapshot")
    }

    pub fn earliest_ts(&self) -> Timestamp {
        *self.snapshots.keys().next().expect("History always holds at least one snapshot")
    }

    /// Discards every snapshot strictly older than the newest one at or
    /// before `ts`, so a subsequent `lookup` at any timestamp `>= ts` remains
    /// answerable. Always retains at least one snapshot. Returns the
    /// timestamp of the oldest snapshot retained.
    pub fn truncate_below(&mut self, ts: Timestamp) -> Timestamp {
        let cutoff = self
            .snapshots
            .range(..=ts)
            .next_back()
            .map(|(ts, _)| *ts)
            .unwrap_or_else(|| self.earliest_ts());
        self.snapshots = self.snapshots.split_off(&cutoff);
        cutoff
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::snapshot::Snapshot;

    fn snap_at(ts: u64) -> Snapshot {
        Snapshot::bootstrap(Timestamp(ts), false, vec![]).unwrap()
    }

    #[test]
    fn lookup_returns_the_newest_snapshot_at_or_before_ts() {
        let mut h = History::new(snap_at(1));
        h.append(snap_at(5));
        h.append(snap_at(9));

        assert!(h.lookup(Timestamp(0)).is_none());
        assert_eq!(h.lookup(Timestamp(1)).unwrap().current_ts(), Timestamp(1));
        assert_eq!(h.lookup(Timestamp(4)).unwrap().current_ts(), Timestamp(1));
        assert_eq!(h.lookup(Timestamp(7)).unwrap().current_ts(), Timestamp(5));
        assert_eq!(h.lookup(Timestamp(100)).unwrap().current_ts(), Timestamp(9));
    }

    #[test]
    fn truncate_below_retains_newest_snapshot_at_or_before_gc_ts() {
        let mut h = History::new(snap_at(1));
        h.append(snap_at(5));
        h.append(snap_at(7));
        h.append(snap_at(9));

        let retained = h.truncate_below(Timestamp(6));
        assert_eq!(retained, Timestamp(5));
        assert_eq!(h.earliest_ts(), Timestamp(5));
        assert_eq!(h.lookup(Timestamp(5)).unwrap().current_ts(), Timestamp(5));
        assert!(h.lookup(Timestamp(1)).is_none());
    }

    #[test]
    fn truncate_below_never_empties_history() {
        let mut h = History::new(snap_at(10));
        let retained = h.truncate_below(Timestamp(0));
        assert_eq!(retained, Timestamp(10));
        assert_eq!(h.len(), 1);
    }
}
