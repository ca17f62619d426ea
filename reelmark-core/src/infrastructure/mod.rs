//! Adapters behind the engine's ports, plus the in-process change bus.

pub mod events;
pub mod memory;

#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub mod postgres;

pub use events::{ProgressEventBus, ProgressEventFrame};
pub use memory::{InMemoryProgressStore, StoreCall};

#[cfg(feature = "database")]
pub use postgres::PostgresProgressStore;
