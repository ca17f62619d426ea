use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelmark_model::{ProgressRecord, RemoteProgressRow, UnitId, ViewerId};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::ports::ProgressStore;

/// [`ProgressStore`] backed by the `viewer_progress` table.
#[derive(Clone, Debug)]
pub struct PostgresProgressStore {
    pool: PgPool,
}

impl PostgresProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        crate::MIGRATOR.run(&self.pool).await?;
        info!(
            target: "progress::store",
            "viewer_progress migrations applied"
        );
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for PostgresProgressStore {
    async fn bulk_upsert(
        &self,
        owner: &ViewerId,
        records: &[ProgressRecord],
    ) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let len = records.len();
        let mut unit_ids = Vec::with_capacity(len);
        let mut kinds = Vec::with_capacity(len);
        let mut positions = Vec::with_capacity(len);
        let mut durations = Vec::with_capacity(len);
        let mut percents = Vec::with_capacity(len);
        let mut watched = Vec::with_capacity(len);
        let mut updated: Vec<DateTime<Utc>> = Vec::with_capacity(len);
        for record in records {
            unit_ids.push(record.unit_id.as_str().to_string());
            kinds.push(record.kind.as_str().to_string());
            positions.push(record.position);
            durations.push(record.duration);
            percents.push(record.percent);
            watched.push(record.is_watched);
            updated.push(record.updated_at);
        }

        // Rows carrying a newer `updated_at` than the incoming one are left
        // untouched.
        sqlx::query(
            r#"
            INSERT INTO viewer_progress (
                owner_id, unit_id, kind, position, duration, percent,
                is_watched, updated_at
            )
            SELECT $1, u.unit_id, u.kind, u.position, u.duration, u.percent,
                   u.is_watched, u.updated_at
            FROM UNNEST(
                $2::text[], $3::text[], $4::float8[], $5::float8[],
                $6::float8[], $7::bool[], $8::timestamptz[]
            ) AS u(
                unit_id, kind, position, duration, percent, is_watched,
                updated_at
            )
            ON CONFLICT (owner_id, unit_id) DO UPDATE SET
                kind = EXCLUDED.kind,
                position = EXCLUDED.position,
                duration = EXCLUDED.duration,
                percent = EXCLUDED.percent,
                is_watched = EXCLUDED.is_watched,
                updated_at = EXCLUDED.updated_at
            WHERE viewer_progress.updated_at <= EXCLUDED.updated_at
            "#,
        )
        .bind(owner.as_str())
        .bind(&unit_ids)
        .bind(&kinds)
        .bind(&positions)
        .bind(&durations)
        .bind(&percents)
        .bind(&watched)
        .bind(&updated)
        .execute(&self.pool)
        .await?;

        debug!(
            target: "progress::store",
            viewer = %owner,
            rows = len,
            "upserted viewer progress"
        );
        Ok(())
    }

    async fn bulk_delete(
        &self,
        owner: &ViewerId,
        unit_ids: &[UnitId],
    ) -> StoreResult<()> {
        if unit_ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<&str> = unit_ids.iter().map(UnitId::as_str).collect();

        sqlx::query(
            r#"
            DELETE FROM viewer_progress
            WHERE owner_id = $1 AND unit_id = ANY($2)
            "#,
        )
        .bind(owner.as_str())
        .bind(&keys)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn select_all_for_owner(
        &self,
        owner: &ViewerId,
    ) -> StoreResult<Vec<RemoteProgressRow>> {
        let rows = sqlx::query_as::<_, RemoteProgressRow>(
            r#"
            SELECT unit_id, kind, position, duration, percent, is_watched,
                   updated_at
            FROM viewer_progress
            WHERE owner_id = $1
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn clear_owner(&self, owner: &ViewerId) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM viewer_progress WHERE owner_id = $1")
                .bind(owner.as_str())
                .execute(&self.pool)
                .await?;

        debug!(
            target: "progress::store",
            viewer = %owner,
            rows = result.rows_affected(),
            "cleared viewer progress"
        );
        Ok(())
    }
}
