//! Viewer switches.
//!
//! The cache only ever holds one viewer's records. Switching flushes what the
//! outgoing viewer still has queued, empties everything and loads the
//! incoming viewer from the store, all while holding the flush gate.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use reelmark_model::{
    Origin, ProgressEvent, ProgressRecord, RemoteProgressRow, UnitId, ViewerId,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::EngineInner;
use super::scheduler::SchedulerCommand;

/// What an identity reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub from: Option<ViewerId>,
    pub to: Option<ViewerId>,
    /// `false` when the identity was already current and nothing happened.
    pub changed: bool,
    /// The best-effort flush for the outgoing viewer failed; its remaining
    /// writes were dropped.
    pub outgoing_flush_failed: bool,
    /// Queued writes discarded by the switch.
    pub dropped_pending: usize,
    /// Records placed in the cache from the store.
    pub loaded: usize,
    /// Rows ignored because they failed validation.
    pub skipped: usize,
    /// The store could not be read; the cache stays empty.
    pub load_failed: bool,
}

impl EngineInner {
    pub(crate) async fn reconcile(
        &self,
        incoming: Option<ViewerId>,
    ) -> ReconcileReport {
        let _gate = self.flush_gate.lock().await;

        let outgoing = self.state.lock().viewer.clone();
        let mut report = ReconcileReport {
            from: outgoing.clone(),
            to: incoming.clone(),
            ..ReconcileReport::default()
        };
        if outgoing == incoming {
            return report;
        }
        report.changed = true;

        if let Some(outgoing) = &outgoing
            && let Err(err) = self.drain_locked().await
        {
            report.outgoing_flush_failed = true;
            warn!(
                target: "progress::identity",
                viewer = %outgoing,
                error = %err,
                "flush for outgoing viewer failed, dropping its pending writes"
            );
        }

        {
            let mut state = self.state.lock();
            report.dropped_pending = state.queue.reset();
            state.cache.clear();
            state.viewer = incoming.clone();
            self.events.publish(ProgressEvent::Cleared {
                origin: Origin::Remote,
            });
        }

        if let Some(viewer) = &incoming {
            self.load_viewer(viewer, &mut report).await;
        }

        info!(
            target: "progress::identity",
            from = ?report.from.as_ref().map(ViewerId::as_str),
            to = ?report.to.as_ref().map(ViewerId::as_str),
            loaded = report.loaded,
            skipped = report.skipped,
            dropped = report.dropped_pending,
            "viewer switched"
        );

        self.notify_scheduler(SchedulerCommand::Settled { failed: false });
        report
    }

    async fn load_viewer(
        &self,
        viewer: &ViewerId,
        report: &mut ReconcileReport,
    ) {
        let rows = match self.store.select_all_for_owner(viewer).await {
            Ok(rows) => rows,
            Err(err) => {
                report.load_failed = true;
                warn!(
                    target: "progress::identity",
                    viewer = %viewer,
                    error = %err,
                    "failed to load progress, starting empty"
                );
                return;
            }
        };

        let newest = newest_per_unit(rows, &mut report.skipped);

        let mut state = self.state.lock();
        // A clear-all issued since the switch outranks everything stored.
        if state.queue.clear_all_pending() {
            return;
        }
        for record in newest.into_values() {
            // Writes made after the switch are newer than the stored copy.
            let local_wins = state.queue.get(&record.unit_id).is_some()
                || state.cache.get(&record.unit_id).is_some_and(|local| {
                    local.updated_at >= record.updated_at
                });
            if local_wins {
                continue;
            }

            state.cache.insert(record.clone());
            self.events.publish(ProgressEvent::Updated {
                record,
                origin: Origin::Remote,
            });
            report.loaded += 1;
        }
    }
}

/// Validates rows and keeps the newest one per unit id.
fn newest_per_unit(
    rows: Vec<RemoteProgressRow>,
    skipped: &mut usize,
) -> HashMap<UnitId, ProgressRecord> {
    let mut newest: HashMap<UnitId, ProgressRecord> = HashMap::new();

    for row in rows {
        let raw_id = row.unit_id.clone();
        let record = match ProgressRecord::try_from(row) {
            Ok(record) => record,
            Err(err) => {
                *skipped += 1;
                warn!(
                    target: "progress::identity",
                    unit_id = %raw_id,
                    error = %err,
                    "skipping malformed progress row"
                );
                continue;
            }
        };

        match newest.entry(record.unit_id.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().updated_at < record.updated_at {
                    slot.insert(record);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    newest
}

/// Follows the identity channel until shutdown or until the sender is gone.
pub(crate) async fn follow(
    inner: Arc<EngineInner>,
    mut identity: watch::Receiver<Option<ViewerId>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = identity.changed() => {
                if changed.is_err() {
                    debug!(
                        target: "progress::identity",
                        "identity source closed"
                    );
                    break;
                }
                let next = identity.borrow_and_update().clone();
                inner.reconcile(next).await;
            }
        }
    }
}
