//! The progress engine: one object that owns the cache and the write-back
//! queue, persists through a [`ProgressStore`] and follows the signed-in
//! viewer.
//!
//! Reads and writes against the cache are synchronous and never wait on the
//! network. Persistence happens on a background scheduler task (debounce,
//! retry cadence) or on demand through [`ProgressEngine::flush_now`].

mod flush;
mod identity;
mod scheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use reelmark_model::{
    Origin, ProgressEvent, ProgressRecord, SeriesSummary, UnitId, UnitKind,
    ViewerId,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::domain::watch::{ProgressCache, WriteBackQueue, summarize_series};
use crate::error::{Result, SyncError};
use crate::infrastructure::events::{ProgressEventBus, ProgressEventFrame};
use crate::ports::ProgressStore;

pub use flush::FlushReport;
pub use identity::ReconcileReport;

use scheduler::SchedulerCommand;

/// Host lifecycle notifications that should push pending writes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The host is about to be hidden or backgrounded.
    Hidden,
    /// The host is about to unload; this is the last chance to write.
    Unload,
}

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) viewer: Option<ViewerId>,
    pub(crate) cache: ProgressCache,
    pub(crate) queue: WriteBackQueue,
}

#[derive(Debug)]
pub(crate) struct EngineInner {
    pub(crate) state: Mutex<EngineState>,
    /// Held for the duration of a flush or an identity reconciliation.
    pub(crate) flush_gate: tokio::sync::Mutex<()>,
    pub(crate) store: Arc<dyn ProgressStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: ProgressEventBus,
    pub(crate) scheduler: mpsc::UnboundedSender<SchedulerCommand>,
    pub(crate) config: EngineConfig,
}

impl EngineInner {
    fn notify_scheduler(&self, command: SchedulerCommand) {
        // The receiver only goes away once the engine is shutting down.
        let _ = self.scheduler.send(command);
    }
}

/// Watch-progress tracking and write-back engine.
///
/// Dropping the engine stops its background tasks without flushing; call
/// [`ProgressEngine::dispose`] for an orderly shutdown.
pub struct ProgressEngine {
    inner: Arc<EngineInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl std::fmt::Debug for ProgressEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEngine")
            .field("viewer", &self.viewer())
            .field("version", &self.version())
            .field("pending", &self.pending_len())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

impl ProgressEngine {
    /// Starts the engine and loads the current viewer's progress.
    ///
    /// Returns once the initial identity has been reconciled, so the first
    /// cache read already reflects the signed-in viewer.
    pub async fn start(
        store: Arc<dyn ProgressStore>,
        identity: watch::Receiver<Option<ViewerId>>,
        config: EngineConfig,
    ) -> Self {
        Self::start_with_clock(store, identity, config, Arc::new(SystemClock))
            .await
    }

    pub async fn start_with_clock(
        store: Arc<dyn ProgressStore>,
        mut identity: watch::Receiver<Option<ViewerId>>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(EngineInner {
            state: Mutex::new(EngineState::default()),
            flush_gate: tokio::sync::Mutex::new(()),
            store,
            clock,
            events: ProgressEventBus::new(config.event_capacity),
            scheduler: scheduler_tx,
            config,
        });
        let shutdown = CancellationToken::new();

        let initial = identity.borrow_and_update().clone();
        inner.reconcile(initial).await;

        let scheduler = tokio::spawn(scheduler::run(
            Arc::clone(&inner),
            scheduler_rx,
            shutdown.clone(),
        ));
        let follower = tokio::spawn(identity::follow(
            Arc::clone(&inner),
            identity,
            shutdown.clone(),
        ));

        info!(
            target: "progress::scheduler",
            debounce_ms = inner.config.debounce_ms,
            retry_interval_ms = inner.config.retry_interval_ms,
            "progress engine started"
        );

        Self {
            inner,
            tasks: Mutex::new(vec![scheduler, follower]),
            shutdown,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn get(&self, unit_id: &UnitId) -> Option<ProgressRecord> {
        self.inner.state.lock().cache.get(unit_id).cloned()
    }

    /// Records a playback sample and schedules it for write-back.
    ///
    /// Never fails: invalid numbers are clamped. With nobody signed in the
    /// record is computed and returned but not kept.
    pub fn upsert_from_sample(
        &self,
        unit_id: UnitId,
        kind: UnitKind,
        position: f64,
        duration: f64,
    ) -> ProgressRecord {
        let record = ProgressRecord::from_sample(
            unit_id,
            kind,
            position,
            duration,
            self.inner.clock.now(),
        );
        self.apply_local(record)
    }

    /// Marks a unit watched or unwatched regardless of its position.
    ///
    /// The write goes through the normal debounce; use
    /// [`ProgressEngine::set_watched`] to persist it right away.
    pub fn force_watched(
        &self,
        unit_id: UnitId,
        kind: UnitKind,
        watched: bool,
        known_duration: Option<f64>,
    ) -> ProgressRecord {
        let record = ProgressRecord::forced(
            unit_id,
            kind,
            watched,
            known_duration,
            self.inner.clock.now(),
        );
        self.apply_local(record)
    }

    /// Watched toggle followed by an awaited forced flush.
    ///
    /// A failed flush leaves the write queued for the retry cadence; the
    /// returned record is the cache state either way. Once the engine is
    /// disposed the record is only computed.
    pub async fn set_watched(
        &self,
        unit_id: UnitId,
        kind: UnitKind,
        watched: bool,
        known_duration: Option<f64>,
    ) -> ProgressRecord {
        if self.disposed.load(Ordering::Acquire) {
            warn!(
                target: "progress::flush",
                unit_id = %unit_id,
                "engine disposed, watched toggle dropped"
            );
            return ProgressRecord::forced(
                unit_id,
                kind,
                watched,
                known_duration,
                self.inner.clock.now(),
            );
        }

        let record =
            self.force_watched(unit_id, kind, watched, known_duration);
        if let Err(err) = self.inner.flush(true).await {
            warn!(
                target: "progress::flush",
                unit_id = %record.unit_id,
                error = %err,
                "watched toggle not persisted yet"
            );
        }
        record
    }

    fn apply_local(&self, record: ProgressRecord) -> ProgressRecord {
        {
            let mut state = self.inner.state.lock();
            if state.viewer.is_none() {
                debug!(
                    target: "progress::scheduler",
                    unit_id = %record.unit_id,
                    "no viewer signed in, progress not tracked"
                );
                return record;
            }
            state.cache.insert(record.clone());
            state.queue.enqueue_upsert(record.clone());
            self.inner.events.publish(ProgressEvent::Updated {
                record: record.clone(),
                origin: Origin::Local,
            });
        }
        self.inner.notify_scheduler(SchedulerCommand::Enqueued);
        record
    }

    /// Forgets a unit locally and deletes it remotely. Idempotent.
    pub fn remove(&self, unit_id: &UnitId) {
        {
            let mut state = self.inner.state.lock();
            if state.viewer.is_none() {
                return;
            }
            // The remote row may exist even when the cache never saw it.
            state.queue.enqueue_delete(unit_id.clone());
            if state.cache.remove(unit_id).is_some() {
                self.inner.events.publish(ProgressEvent::Deleted {
                    unit_id: unit_id.clone(),
                    origin: Origin::Local,
                });
            }
        }
        self.inner.notify_scheduler(SchedulerCommand::Enqueued);
    }

    /// Drops every record of the current viewer, locally and remotely.
    pub fn clear_all(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.viewer.is_none() {
                return;
            }
            state.queue.request_clear_all();
            if state.cache.clear() > 0 {
                self.inner.events.publish(ProgressEvent::Cleared {
                    origin: Origin::Local,
                });
            }
        }
        self.inner.notify_scheduler(SchedulerCommand::Enqueued);
    }

    pub fn resume_position(
        &self,
        unit_id: &UnitId,
        duration: f64,
    ) -> Option<f64> {
        self.inner
            .state
            .lock()
            .cache
            .resume_position(unit_id, duration)
    }

    pub fn series_summary(
        &self,
        series_id: &UnitId,
        total_episodes: Option<u32>,
    ) -> Option<SeriesSummary> {
        summarize_series(
            &self.inner.state.lock().cache,
            series_id,
            total_episodes,
        )
    }

    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.inner.state.lock().cache.snapshot()
    }

    pub fn continue_watching(&self, limit: usize) -> Vec<ProgressRecord> {
        self.inner.state.lock().cache.continue_watching(limit)
    }

    /// Monotonic counter bumped by every cache mutation.
    pub fn version(&self) -> u64 {
        self.inner.state.lock().cache.version()
    }

    pub fn viewer(&self) -> Option<ViewerId> {
        self.inner.state.lock().viewer.clone()
    }

    /// Writes waiting to be sent, counting a pending clear-all as one.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEventFrame> {
        self.inner.events.subscribe()
    }

    /// Sends pending writes now.
    ///
    /// With `force == false` the call is skipped when a flush is already in
    /// flight. With `force == true` it waits for that flush and then drains
    /// the queue.
    pub async fn flush_now(&self, force: bool) -> Result<FlushReport> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SyncError::Disposed);
        }
        self.inner.flush(force).await
    }

    /// Fire-and-forget flush for host lifecycle events.
    pub fn on_lifecycle(&self, signal: LifecycleSignal) {
        debug!(target: "progress::scheduler", ?signal, "lifecycle signal");
        let force = matches!(signal, LifecycleSignal::Unload);
        self.inner
            .notify_scheduler(SchedulerCommand::FlushNow { force });
    }

    /// Switches to `identity` right away, bypassing the identity channel.
    pub async fn reconcile(
        &self,
        identity: Option<ViewerId>,
    ) -> Result<ReconcileReport> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SyncError::Disposed);
        }
        Ok(self.inner.reconcile(identity).await)
    }

    /// Final forced flush, then stops the background tasks.
    ///
    /// The flush result is returned; the tasks are stopped regardless.
    pub async fn dispose(&self) -> Result<FlushReport> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(SyncError::Disposed);
        }

        let flushed = self.inner.flush(true).await;
        self.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(
                    target: "progress::scheduler",
                    error = %err,
                    "background task ended abnormally"
                );
            }
        }

        info!(
            target: "progress::scheduler",
            pending = self.pending_len(),
            "progress engine disposed"
        );
        flushed
    }
}

impl Drop for ProgressEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
