#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelmark_core::{
    EngineConfig, InMemoryProgressStore, ManualClock, ProgressEngine,
    ProgressEventFrame, ProgressStore, StoreResult,
};
use reelmark_model::chrono::{DateTime, TimeZone, Utc};
use reelmark_model::{
    Origin, ProgressEvent, ProgressRecord, RemoteProgressRow, UnitId, ViewerId,
};
use tokio::sync::{Notify, Semaphore, broadcast, watch};

pub struct Harness {
    pub engine: ProgressEngine,
    pub store: Arc<InMemoryProgressStore>,
    pub identity: watch::Sender<Option<ViewerId>>,
}

pub async fn start(viewer: Option<&str>) -> Harness {
    start_with_store(Arc::new(InMemoryProgressStore::new()), viewer).await
}

pub async fn start_with_store(
    store: Arc<InMemoryProgressStore>,
    viewer: Option<&str>,
) -> Harness {
    let (identity, identity_rx) = watch::channel(viewer.map(ViewerId::from));
    let engine = ProgressEngine::start(
        store.clone(),
        identity_rx,
        EngineConfig::default(),
    )
    .await;
    Harness {
        engine,
        store,
        identity,
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn row(
    unit_id: &str,
    kind: &str,
    position: f64,
    duration: f64,
) -> RemoteProgressRow {
    let percent = if duration > 0.0 {
        position * 100.0 / duration
    } else {
        0.0
    };
    RemoteProgressRow {
        unit_id: unit_id.to_string(),
        kind: kind.to_string(),
        position,
        duration,
        percent,
        is_watched: percent >= 85.0,
        updated_at: at(0),
    }
}

/// Lets spawned tasks drain without moving past any real deadline.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}

/// Store call that [`GatedStore`] can hold open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Select,
    Upsert,
}

/// Wraps the in-memory store and parks the next armed call until
/// [`GatedStore::release`], so tests can act while it is in flight.
#[derive(Debug)]
pub struct GatedStore {
    pub inner: Arc<InMemoryProgressStore>,
    armed: Mutex<Option<Gate>>,
    entered: Notify,
    release: Semaphore,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemoryProgressStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    pub fn arm(&self, gate: Gate) {
        *self.armed.lock() = Some(gate);
    }

    /// Resolves once the armed call is parked.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self, gate: Gate) {
        let parked = {
            let mut armed = self.armed.lock();
            if *armed == Some(gate) {
                *armed = None;
                true
            } else {
                false
            }
        };
        if parked {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl ProgressStore for GatedStore {
    async fn bulk_upsert(
        &self,
        owner: &ViewerId,
        records: &[ProgressRecord],
    ) -> StoreResult<()> {
        self.pass(Gate::Upsert).await;
        self.inner.bulk_upsert(owner, records).await
    }

    async fn bulk_delete(
        &self,
        owner: &ViewerId,
        unit_ids: &[UnitId],
    ) -> StoreResult<()> {
        self.inner.bulk_delete(owner, unit_ids).await
    }

    async fn select_all_for_owner(
        &self,
        owner: &ViewerId,
    ) -> StoreResult<Vec<RemoteProgressRow>> {
        self.pass(Gate::Select).await;
        self.inner.select_all_for_owner(owner).await
    }

    async fn clear_owner(&self, owner: &ViewerId) -> StoreResult<()> {
        self.inner.clear_owner(owner).await
    }
}

pub struct GatedHarness {
    pub engine: Arc<ProgressEngine>,
    pub store: Arc<GatedStore>,
    pub clock: Arc<ManualClock>,
    pub identity: watch::Sender<Option<ViewerId>>,
}

/// Engine over a [`GatedStore`] with a clock starting at
/// [`at`]`(clock_secs)`.
pub async fn start_gated(
    backing: Arc<InMemoryProgressStore>,
    viewer: Option<&str>,
    clock_secs: i64,
) -> GatedHarness {
    let store = Arc::new(GatedStore::new(backing));
    let clock = Arc::new(ManualClock::new(at(clock_secs)));
    let (identity, identity_rx) = watch::channel(viewer.map(ViewerId::from));
    let engine = ProgressEngine::start_with_clock(
        store.clone(),
        identity_rx,
        EngineConfig::default(),
        clock.clone(),
    )
    .await;
    GatedHarness {
        engine: Arc::new(engine),
        store,
        clock,
        identity,
    }
}

/// Unit ids of every `Updated { origin: Remote }` frame received so far.
pub fn remote_updates(
    events: &mut broadcast::Receiver<ProgressEventFrame>,
) -> Vec<UnitId> {
    let mut ids = Vec::new();
    while let Ok(frame) = events.try_recv() {
        if let ProgressEvent::Updated {
            record,
            origin: Origin::Remote,
        } = frame.event
        {
            ids.push(record.unit_id);
        }
    }
    ids
}
