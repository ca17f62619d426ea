//! # Reelmark Core
//!
//! Watch-progress tracking and synchronization for Reelmark clients.
//!
//! ## Overview
//!
//! - **Progress cache**: the latest playback position per movie, series and
//!   episode, readable without touching the network
//! - **Write-back**: a keyed queue flushed to a remote store after a short
//!   debounce, with an unbounded retry cadence while anything is pending
//! - **Identity reconciliation**: the cache follows the signed-in viewer and
//!   never mixes two viewers' records
//! - **Series aggregation**: series-level percent and watched status derived
//!   from per-episode records
//! - **Change notifications**: a broadcast of every cache mutation
//!
//! ## Feature Flags
//!
//! - `database`: PostgreSQL progress store built on SQLx (enabled by default)
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reelmark_core::{
//!     EngineConfig, InMemoryProgressStore, ProgressEngine,
//! };
//! use reelmark_model::{UnitId, UnitKind, ViewerId};
//! use tokio::sync::watch;
//!
//! # async fn demo() -> reelmark_core::Result<()> {
//! let store = Arc::new(InMemoryProgressStore::new());
//! let (_identity_tx, identity_rx) =
//!     watch::channel(Some(ViewerId::from("viewer-1")));
//!
//! let engine =
//!     ProgressEngine::start(store, identity_rx, EngineConfig::default())
//!         .await;
//! engine.upsert_from_sample(UnitId::movie(7), UnitKind::Movie, 170.0, 200.0);
//! assert_eq!(engine.resume_position(&UnitId::movie(7), 200.0), None);
//!
//! engine.dispose().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Clock abstraction used to stamp records
pub mod clock;

/// Engine and scheduler tuning
pub mod config;

/// Cache, write-back queue and series aggregation
pub mod domain;

/// The engine object and its background tasks
pub mod engine;

/// Error types for stores and synchronization
pub mod error;

/// Store adapters and the change bus
pub mod infrastructure;

/// Traits implemented by remote progress stores
pub mod ports;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, RetryConfig};
pub use engine::{FlushReport, LifecycleSignal, ProgressEngine, ReconcileReport};
pub use error::{Result, StoreError, StoreResult, SyncError};
pub use infrastructure::{
    InMemoryProgressStore, ProgressEventBus, ProgressEventFrame,
};
pub use ports::ProgressStore;

#[cfg(feature = "database")]
pub use infrastructure::PostgresProgressStore;
