//! Watch-progress domain: the in-memory cache, the write-back queue and the
//! series aggregation view. Everything here is synchronous and owned by the
//! engine; persistence and scheduling live in [`crate::engine`].

pub mod cache;
pub mod queue;
pub mod series;

pub use cache::ProgressCache;
pub use queue::{FlushBatch, WriteBackQueue};
pub use series::summarize_series;
