use std::fmt;

use async_trait::async_trait;
use reelmark_model::{ProgressRecord, RemoteProgressRow, UnitId, ViewerId};

use crate::error::StoreResult;

/// Durable, owner-scoped progress storage.
///
/// Rows are keyed by `(owner, unit_id)`. Implementations must treat
/// [`ProgressStore::bulk_upsert`] as insert-or-update on that key and should
/// not let an older `updated_at` overwrite a newer one.
#[async_trait]
pub trait ProgressStore: Send + Sync + fmt::Debug {
    async fn bulk_upsert(
        &self,
        owner: &ViewerId,
        records: &[ProgressRecord],
    ) -> StoreResult<()>;

    async fn bulk_delete(
        &self,
        owner: &ViewerId,
        unit_ids: &[UnitId],
    ) -> StoreResult<()>;

    async fn select_all_for_owner(
        &self,
        owner: &ViewerId,
    ) -> StoreResult<Vec<RemoteProgressRow>>;

    /// Removes every row the owner has stored.
    async fn clear_owner(&self, owner: &ViewerId) -> StoreResult<()> {
        let unit_ids: Vec<UnitId> = self
            .select_all_for_owner(owner)
            .await?
            .into_iter()
            .map(|row| UnitId::from(row.unit_id))
            .collect();
        if unit_ids.is_empty() {
            return Ok(());
        }
        self.bulk_delete(owner, &unit_ids).await
    }
}
