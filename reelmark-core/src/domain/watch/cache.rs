//! Latest-known progress per trackable unit for the signed-in viewer.

use std::collections::HashMap;

use reelmark_model::{ProgressRecord, UnitId};

/// Authoritative in-memory map of progress records.
///
/// Every call that changes the contents bumps [`ProgressCache::version`], so
/// observers that missed an event can still tell something moved.
#[derive(Debug, Default)]
pub struct ProgressCache {
    records: HashMap<UnitId, ProgressRecord>,
    version: u64,
}

impl ProgressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unit_id: &UnitId) -> Option<&ProgressRecord> {
        self.records.get(unit_id)
    }

    /// Replaces whatever was stored for the record's unit.
    pub fn insert(&mut self, record: ProgressRecord) -> Option<ProgressRecord> {
        self.version += 1;
        self.records.insert(record.unit_id.clone(), record)
    }

    pub fn remove(&mut self, unit_id: &UnitId) -> Option<ProgressRecord> {
        let removed = self.records.remove(unit_id);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    /// Empties the cache, returning how many records were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.records.len();
        if dropped > 0 {
            self.records.clear();
            self.version += 1;
        }
        dropped
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgressRecord> {
        self.records.values()
    }

    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.records.values().cloned().collect()
    }

    /// Started-but-unwatched records, most recently updated first.
    pub fn continue_watching(&self, limit: usize) -> Vec<ProgressRecord> {
        let mut items: Vec<&ProgressRecord> = self
            .records
            .values()
            .filter(|record| record.is_in_progress())
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items.into_iter().take(limit).cloned().collect()
    }

    pub fn resume_position(
        &self,
        unit_id: &UnitId,
        duration: f64,
    ) -> Option<f64> {
        self.records.get(unit_id)?.resume_position(duration)
    }
}
