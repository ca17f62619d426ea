//! Contracts the engine consumes from the outside world.

pub mod progress_store;

pub use progress_store::ProgressStore;
