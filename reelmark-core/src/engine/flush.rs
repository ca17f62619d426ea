use reelmark_model::{PendingOp, ViewerId};
use tracing::{debug, info, warn};

use super::EngineInner;
use super::scheduler::SchedulerCommand;
use crate::domain::watch::FlushBatch;
use crate::error::{Result, StoreError, SyncError};

/// Outcome of one flush request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub upserted: usize,
    pub deleted: usize,
    /// A remote clear-all for the viewer was executed.
    pub cleared: bool,
    /// Routine flush skipped because another one was in flight.
    pub skipped: bool,
}

impl FlushReport {
    pub fn is_noop(&self) -> bool {
        self.upserted == 0 && self.deleted == 0 && !self.cleared
    }

    fn absorb(&mut self, other: FlushReport) {
        self.upserted += other.upserted;
        self.deleted += other.deleted;
        self.cleared |= other.cleared;
    }
}

impl EngineInner {
    /// Flush entry point shared by the scheduler, lifecycle signals and the
    /// public API.
    pub(crate) async fn flush(&self, force: bool) -> Result<FlushReport> {
        let _gate = if force {
            self.flush_gate.lock().await
        } else {
            match self.flush_gate.try_lock() {
                Ok(gate) => gate,
                Err(_) => {
                    debug!(
                        target: "progress::flush",
                        "flush already in flight, skipping routine request"
                    );
                    return Ok(FlushReport {
                        skipped: true,
                        ..FlushReport::default()
                    });
                }
            }
        };

        let outcome = self.drain_locked().await;
        self.notify_scheduler(SchedulerCommand::Settled {
            failed: outcome.is_err(),
        });
        outcome
    }

    /// Sends batches until the queue is empty or a store call fails.
    ///
    /// Callers must hold the flush gate.
    pub(crate) async fn drain_locked(&self) -> Result<FlushReport> {
        let mut report = FlushReport::default();

        loop {
            let next = {
                let mut state = self.state.lock();
                match state.viewer.clone() {
                    Some(owner) => state
                        .queue
                        .take_batch()
                        .map(|batch| (owner, batch)),
                    None => None,
                }
            };
            let Some((owner, batch)) = next else {
                break;
            };

            report.absorb(self.send_batch(&owner, batch).await?);
        }

        if !report.is_noop() {
            info!(
                target: "progress::flush",
                upserted = report.upserted,
                deleted = report.deleted,
                cleared = report.cleared,
                "flushed progress"
            );
        }
        Ok(report)
    }

    async fn send_batch(
        &self,
        owner: &ViewerId,
        batch: FlushBatch,
    ) -> Result<FlushReport> {
        match batch {
            FlushBatch::ClearAll { generation } => {
                match self.store.clear_owner(owner).await {
                    Ok(()) => Ok(FlushReport {
                        cleared: true,
                        ..FlushReport::default()
                    }),
                    Err(source) => {
                        let rearmed =
                            self.state.lock().queue.requeue_clear_all(generation);
                        Err(self.failed(owner, usize::from(rearmed), source))
                    }
                }
            }
            FlushBatch::Entries {
                generation,
                upserts,
                deletes,
            } => {
                let mut report = FlushReport::default();
                let mut failure = None;

                if !upserts.is_empty() {
                    match self.store.bulk_upsert(owner, &upserts).await {
                        Ok(()) => report.upserted = upserts.len(),
                        Err(err) => failure = Some(err),
                    }
                }
                // Deletes are independent of the upserts, so a failed upsert
                // call does not hold them back.
                if !deletes.is_empty() {
                    match self.store.bulk_delete(owner, &deletes).await {
                        Ok(()) => report.deleted = deletes.len(),
                        Err(err) => {
                            failure.get_or_insert(err);
                        }
                    }
                }

                let Some(source) = failure else {
                    return Ok(report);
                };

                let mut requeued = 0;
                let mut state = self.state.lock();
                if report.upserted == 0 {
                    for record in upserts {
                        let unit_id = record.unit_id.clone();
                        requeued += usize::from(state.queue.requeue(
                            generation,
                            unit_id,
                            PendingOp::Upsert { record },
                        ));
                    }
                }
                if report.deleted == 0 {
                    for unit_id in deletes {
                        requeued += usize::from(state.queue.requeue(
                            generation,
                            unit_id,
                            PendingOp::Delete,
                        ));
                    }
                }
                drop(state);

                Err(self.failed(owner, requeued, source))
            }
        }
    }

    fn failed(
        &self,
        owner: &ViewerId,
        requeued: usize,
        source: StoreError,
    ) -> SyncError {
        warn!(
            target: "progress::flush",
            viewer = %owner,
            requeued,
            error = %source,
            "flush failed, will retry"
        );
        SyncError::FlushFailed { requeued, source }
    }
}
