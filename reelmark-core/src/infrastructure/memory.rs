use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelmark_model::{ProgressRecord, RemoteProgressRow, UnitId, ViewerId};

use crate::error::{StoreError, StoreResult};
use crate::ports::ProgressStore;

/// One call observed by [`InMemoryProgressStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Upsert {
        owner: ViewerId,
        unit_ids: Vec<UnitId>,
    },
    Delete {
        owner: ViewerId,
        unit_ids: Vec<UnitId>,
    },
    Select {
        owner: ViewerId,
    },
    Clear {
        owner: ViewerId,
    },
}

#[derive(Debug, Default)]
struct Failures {
    upserts: usize,
    deletes: usize,
    selects: usize,
    clears: usize,
    offline: bool,
}

impl Failures {
    fn take(counter: &mut usize, offline: bool) -> bool {
        if offline {
            return true;
        }
        if *counter > 0 {
            *counter -= 1;
            return true;
        }
        false
    }
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<ViewerId, HashMap<String, RemoteProgressRow>>,
    calls: Vec<StoreCall>,
    failures: Failures,
}

/// Process-local [`ProgressStore`].
///
/// Keeps rows per owner with last-write-wins upserts, records every call and
/// can be told to fail, which is what tests and the CLI's memory mode need.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    inner: Mutex<Inner>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places rows as if an earlier session had written them.
    pub fn seed(
        &self,
        owner: &ViewerId,
        rows: impl IntoIterator<Item = RemoteProgressRow>,
    ) {
        let mut inner = self.inner.lock();
        let table = inner.rows.entry(owner.clone()).or_default();
        for row in rows {
            table.insert(row.unit_id.clone(), row);
        }
    }

    /// Rows stored for `owner`, sorted by unit id.
    pub fn rows_for(&self, owner: &ViewerId) -> Vec<RemoteProgressRow> {
        let inner = self.inner.lock();
        let mut rows: Vec<RemoteProgressRow> = inner
            .rows
            .get(owner)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        rows
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Upsert { .. }))
    }

    pub fn delete_calls(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Delete { .. }))
    }

    pub fn select_calls(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Select { .. }))
    }

    pub fn clear_calls(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Clear { .. }))
    }

    fn count(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    pub fn fail_next_upserts(&self, times: usize) {
        self.inner.lock().failures.upserts = times;
    }

    pub fn fail_next_deletes(&self, times: usize) {
        self.inner.lock().failures.deletes = times;
    }

    pub fn fail_next_selects(&self, times: usize) {
        self.inner.lock().failures.selects = times;
    }

    pub fn fail_next_clears(&self, times: usize) {
        self.inner.lock().failures.clears = times;
    }

    /// Every call fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().failures.offline = offline;
    }
}

fn unavailable(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("{operation} failed (injected)"))
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn bulk_upsert(
        &self,
        owner: &ViewerId,
        records: &[ProgressRecord],
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Upsert {
            owner: owner.clone(),
            unit_ids: records.iter().map(|r| r.unit_id.clone()).collect(),
        });
        let offline = inner.failures.offline;
        if Failures::take(&mut inner.failures.upserts, offline) {
            return Err(unavailable("upsert"));
        }

        let table = inner.rows.entry(owner.clone()).or_default();
        for record in records {
            let row = RemoteProgressRow::from(record);
            let stale = table
                .get(&row.unit_id)
                .is_some_and(|existing| existing.updated_at > row.updated_at);
            if !stale {
                table.insert(row.unit_id.clone(), row);
            }
        }
        Ok(())
    }

    async fn bulk_delete(
        &self,
        owner: &ViewerId,
        unit_ids: &[UnitId],
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Delete {
            owner: owner.clone(),
            unit_ids: unit_ids.to_vec(),
        });
        let offline = inner.failures.offline;
        if Failures::take(&mut inner.failures.deletes, offline) {
            return Err(unavailable("delete"));
        }

        if let Some(table) = inner.rows.get_mut(owner) {
            for unit_id in unit_ids {
                table.remove(unit_id.as_str());
            }
        }
        Ok(())
    }

    async fn select_all_for_owner(
        &self,
        owner: &ViewerId,
    ) -> StoreResult<Vec<RemoteProgressRow>> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(StoreCall::Select {
                owner: owner.clone(),
            });
            let offline = inner.failures.offline;
            if Failures::take(&mut inner.failures.selects, offline) {
                return Err(unavailable("select"));
            }
        }
        Ok(self.rows_for(owner))
    }

    async fn clear_owner(&self, owner: &ViewerId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Clear {
            owner: owner.clone(),
        });
        let offline = inner.failures.offline;
        if Failures::take(&mut inner.failures.clears, offline) {
            return Err(unavailable("clear"));
        }

        inner.rows.remove(owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reelmark_model::UnitKind;

    fn record(id: i64, position: f64, secs: i64) -> ProgressRecord {
        ProgressRecord::from_sample(
            UnitId::movie(id),
            UnitKind::Movie,
            position,
            100.0,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn older_upserts_do_not_overwrite_newer_rows() {
        let store = InMemoryProgressStore::new();
        let owner = ViewerId::from("a");

        store
            .bulk_upsert(&owner, &[record(1, 60.0, 10)])
            .await
            .unwrap();
        store.bulk_upsert(&owner, &[record(1, 20.0, 5)]).await.unwrap();

        let rows = store.rows_for(&owner);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, 60.0);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = InMemoryProgressStore::new();
        let owner = ViewerId::from("a");
        store.fail_next_upserts(1);

        assert!(store.bulk_upsert(&owner, &[record(1, 1.0, 0)]).await.is_err());
        assert!(store.bulk_upsert(&owner, &[record(1, 1.0, 0)]).await.is_ok());
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let store = InMemoryProgressStore::new();
        let a = ViewerId::from("a");
        let b = ViewerId::from("b");
        store.bulk_upsert(&a, &[record(1, 1.0, 0)]).await.unwrap();
        store.bulk_upsert(&b, &[record(2, 1.0, 0)]).await.unwrap();

        store.clear_owner(&a).await.unwrap();
        assert!(store.select_all_for_owner(&a).await.unwrap().is_empty());
        assert_eq!(store.rows_for(&b).len(), 1);
    }

    #[tokio::test]
    async fn offline_store_rejects_everything() {
        let store = InMemoryProgressStore::new();
        let owner = ViewerId::from("a");
        store.set_offline(true);

        assert!(store.select_all_for_owner(&owner).await.is_err());
        assert!(store.bulk_delete(&owner, &[UnitId::movie(1)]).await.is_err());

        store.set_offline(false);
        assert!(store.select_all_for_owner(&owner).await.is_ok());
    }
}
