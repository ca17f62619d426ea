//! Background write-back loop.
//!
//! Two deadlines drive it: a debounce that moves with every enqueue and a
//! retry deadline that is armed once while anything is pending and is not
//! pushed back by further enqueues, so continuous playback still gets
//! written out on the retry cadence.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::EngineInner;
use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchedulerCommand {
    /// Something was written to the queue.
    Enqueued,
    /// Flush right away without waiting for the debounce.
    FlushNow { force: bool },
    /// A flush cycle finished. The queue length is read when this is
    /// handled, not when it is sent.
    Settled { failed: bool },
}

#[derive(Debug, Default)]
struct Deadlines {
    debounce_at: Option<Instant>,
    retry_at: Option<Instant>,
    failures: u32,
}

impl Deadlines {
    fn on_enqueued(&mut self, config: &EngineConfig) {
        let now = Instant::now();
        self.debounce_at = Some(now + config.debounce());
        let retry = now + config.retry_delay(self.failures);
        self.retry_at.get_or_insert(retry);
    }

    fn on_settled(
        &mut self,
        config: &EngineConfig,
        failed: bool,
        pending: usize,
    ) {
        if failed {
            self.failures = self.failures.saturating_add(1);
            // A failure restarts the retry cadence from now.
            self.retry_at =
                Some(Instant::now() + config.retry_delay(self.failures));
            return;
        }

        self.failures = 0;
        if pending == 0 {
            self.debounce_at = None;
            self.retry_at = None;
        } else if self.retry_at.is_none() {
            self.retry_at = Some(Instant::now() + config.retry_delay(0));
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub(crate) async fn run(
    inner: Arc<EngineInner>,
    mut commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    shutdown: CancellationToken,
) {
    let mut deadlines = Deadlines::default();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(target: "progress::scheduler", "scheduler shutting down");
                break;
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                trace!(target: "progress::scheduler", ?command, "command");
                match command {
                    SchedulerCommand::Enqueued => {
                        deadlines.on_enqueued(&inner.config);
                    }
                    SchedulerCommand::FlushNow { force } => {
                        deadlines.debounce_at = None;
                        // Failures are logged by the flush and reported back
                        // through `Settled`.
                        let _ = inner.flush(force).await;
                    }
                    SchedulerCommand::Settled { failed } => {
                        // Anything enqueued since the flush read the queue
                        // is already counted here.
                        let pending = inner.state.lock().queue.len();
                        deadlines.on_settled(&inner.config, failed, pending);
                    }
                }
            }
            _ = sleep_until_opt(deadlines.debounce_at) => {
                deadlines.debounce_at = None;
                debug!(target: "progress::scheduler", "debounce elapsed");
                let _ = inner.flush(false).await;
            }
            _ = sleep_until_opt(deadlines.retry_at) => {
                deadlines.retry_at = None;
                debug!(
                    target: "progress::scheduler",
                    failures = deadlines.failures,
                    "retry interval elapsed"
                );
                let _ = inner.flush(false).await;
            }
        }
    }
}
