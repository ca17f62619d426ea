//! Keyed write-back queue between the cache and the remote store.
//!
//! The queue is a map, not a log: one pending operation per unit id, the
//! latest action replacing any earlier one. Its size is bounded by the number
//! of distinct units touched, never by how many samples the player sent.

use std::collections::HashMap;

use reelmark_model::{PendingOp, ProgressRecord, UnitId};

/// Snapshot moved out of the queue for one flush cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushBatch {
    /// Drop everything the viewer has stored. Other entries stay queued and
    /// go out on the next cycle.
    ClearAll { generation: u64 },
    Entries {
        generation: u64,
        upserts: Vec<ProgressRecord>,
        deletes: Vec<UnitId>,
    },
}

impl FlushBatch {
    pub fn generation(&self) -> u64 {
        match self {
            FlushBatch::ClearAll { generation }
            | FlushBatch::Entries { generation, .. } => *generation,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FlushBatch::ClearAll { .. } => 1,
            FlushBatch::Entries {
                upserts, deletes, ..
            } => upserts.len() + deletes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct WriteBackQueue {
    entries: HashMap<UnitId, PendingOp>,
    clear_all: bool,
    /// Bumped whenever queued entries are discarded wholesale (clear-all or
    /// identity reset) so stale in-flight entries are never requeued.
    generation: u64,
}

impl WriteBackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_upsert(&mut self, record: ProgressRecord) {
        self.entries
            .insert(record.unit_id.clone(), PendingOp::Upsert { record });
    }

    pub fn enqueue_delete(&mut self, unit_id: UnitId) {
        self.entries.insert(unit_id, PendingOp::Delete);
    }

    /// Supersedes every queued entry with a single clear-all.
    pub fn request_clear_all(&mut self) {
        self.entries.clear();
        self.clear_all = true;
        self.generation += 1;
    }

    /// Drops everything without sending it. Used when the viewer changes.
    pub fn reset(&mut self) -> usize {
        let dropped = self.len();
        self.entries.clear();
        self.clear_all = false;
        self.generation += 1;
        dropped
    }

    pub fn get(&self, unit_id: &UnitId) -> Option<&PendingOp> {
        self.entries.get(unit_id)
    }

    pub fn clear_all_pending(&self) -> bool {
        self.clear_all
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.clear_all)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && !self.clear_all
    }

    /// Moves the next batch out of the queue.
    ///
    /// A pending clear-all goes out alone; otherwise every entry is taken and
    /// split into upserts and deletes.
    pub fn take_batch(&mut self) -> Option<FlushBatch> {
        if self.clear_all {
            self.clear_all = false;
            return Some(FlushBatch::ClearAll {
                generation: self.generation,
            });
        }
        if self.entries.is_empty() {
            return None;
        }

        let mut upserts = Vec::new();
        let mut deletes = Vec::new();
        for (unit_id, op) in self.entries.drain() {
            match op {
                PendingOp::Upsert { record } => upserts.push(record),
                PendingOp::Delete => deletes.push(unit_id),
            }
        }

        Some(FlushBatch::Entries {
            generation: self.generation,
            upserts,
            deletes,
        })
    }

    /// Puts a failed entry back unless something newer replaced it.
    ///
    /// Returns `false` when the entry was dropped: either the key gained a
    /// newer pending operation while the batch was in flight, or the queue was
    /// cleared since the batch was taken.
    pub fn requeue(
        &mut self,
        generation: u64,
        unit_id: UnitId,
        op: PendingOp,
    ) -> bool {
        if generation != self.generation
            || self.entries.contains_key(&unit_id)
        {
            return false;
        }
        self.entries.insert(unit_id, op);
        true
    }

    /// Re-arms a clear-all whose remote call failed.
    pub fn requeue_clear_all(&mut self, generation: u64) -> bool {
        // A newer clear-all bumps the generation and is already armed.
        if generation != self.generation {
            return false;
        }
        self.clear_all = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reelmark_model::UnitKind;

    fn record(id: &str, position: f64) -> ProgressRecord {
        ProgressRecord::from_sample(
            UnitId::from(id),
            UnitKind::Movie,
            position,
            100.0,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn repeated_upserts_coalesce() {
        let mut queue = WriteBackQueue::new();
        for position in [5.0, 10.0, 15.0, 20.0] {
            queue.enqueue_upsert(record("movie:1", position));
        }
        assert_eq!(queue.len(), 1);

        let Some(FlushBatch::Entries {
            upserts, deletes, ..
        }) = queue.take_batch()
        else {
            panic!("expected an entry batch");
        };
        assert!(deletes.is_empty());
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].position, 20.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn last_action_wins_between_upsert_and_delete() {
        let mut queue = WriteBackQueue::new();
        let id = UnitId::from("movie:1");

        queue.enqueue_upsert(record("movie:1", 5.0));
        queue.enqueue_delete(id.clone());
        assert_eq!(queue.get(&id), Some(&PendingOp::Delete));

        queue.enqueue_upsert(record("movie:1", 7.0));
        assert!(matches!(queue.get(&id), Some(PendingOp::Upsert { .. })));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_all_goes_out_alone() {
        let mut queue = WriteBackQueue::new();
        queue.enqueue_upsert(record("movie:1", 5.0));
        queue.request_clear_all();
        queue.enqueue_upsert(record("movie:2", 5.0));

        assert!(matches!(
            queue.take_batch(),
            Some(FlushBatch::ClearAll { .. })
        ));
        // Entries written after the clear survive for the next cycle.
        let Some(FlushBatch::Entries { upserts, .. }) = queue.take_batch()
        else {
            panic!("expected an entry batch");
        };
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].unit_id.as_str(), "movie:2");
        assert_eq!(queue.take_batch(), None);
    }

    #[test]
    fn requeue_never_overwrites_newer_entries() {
        let mut queue = WriteBackQueue::new();
        queue.enqueue_upsert(record("movie:1", 5.0));
        queue.enqueue_upsert(record("movie:2", 5.0));
        let batch = queue.take_batch().unwrap();
        let generation = batch.generation();

        // Newer sample for movie:1 arrives while the batch is in flight.
        queue.enqueue_upsert(record("movie:1", 50.0));

        let FlushBatch::Entries { upserts, .. } = batch else {
            panic!("expected an entry batch");
        };
        for failed in upserts {
            queue.requeue(
                generation,
                failed.unit_id.clone(),
                PendingOp::Upsert { record: failed },
            );
        }

        assert_eq!(queue.len(), 2);
        let Some(PendingOp::Upsert { record }) =
            queue.get(&UnitId::from("movie:1"))
        else {
            panic!("movie:1 should stay queued");
        };
        assert_eq!(record.position, 50.0);
        assert!(queue.get(&UnitId::from("movie:2")).is_some());
    }

    #[test]
    fn requeue_after_reset_is_dropped() {
        let mut queue = WriteBackQueue::new();
        queue.enqueue_upsert(record("movie:1", 5.0));
        let batch = queue.take_batch().unwrap();
        queue.reset();

        assert!(!queue.requeue(
            batch.generation(),
            UnitId::from("movie:1"),
            PendingOp::Delete,
        ));
        assert!(!queue.requeue_clear_all(batch.generation()));
        assert!(queue.is_empty());
    }
}
