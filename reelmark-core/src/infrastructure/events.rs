use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use reelmark_model::ProgressEvent;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct ProgressEventFrame {
    pub sequence: u64,
    pub emitted_at: Instant,
    pub event: ProgressEvent,
}

/// In-process fan-out of cache mutations.
///
/// Publishing never blocks and never fails: with no subscribers the frame is
/// dropped, and a subscriber that falls more than `capacity` frames behind
/// receives `Lagged` and should re-read the cache.
pub struct ProgressEventBus {
    tx: broadcast::Sender<ProgressEventFrame>,
    sequence: AtomicU64,
    capacity: usize,
}

impl fmt::Debug for ProgressEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.tx.receiver_count())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}

impl ProgressEventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            sequence: AtomicU64::new(0),
            capacity,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEventFrame> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, event: ProgressEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.tx.send(ProgressEventFrame {
            sequence,
            emitted_at: Instant::now(),
            event,
        });
        sequence
    }
}
