//! Core data model definitions shared across Reelmark crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod error;
pub mod events;
pub mod ids;
pub mod pending;
pub mod progress;
pub mod watch;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use events::{Origin, ProgressEvent};
pub use ids::{UnitId, UnitKind, ViewerId};
pub use pending::PendingOp;
pub use progress::{
    END_GUARD_OFFSET, ProgressRecord, RESUME_BACK_OFFSET, RemoteProgressRow,
    WATCHED_THRESHOLD,
};
pub use watch::{SeriesSummary, SummarySource};
