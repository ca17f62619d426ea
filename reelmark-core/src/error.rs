use thiserror::Error;

/// Failure reported by a remote progress store.
///
/// Every variant is treated as retryable by the flush scheduler.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request: {0}")]
    Rejected(String),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("flush failed, {requeued} pending writes requeued: {source}")]
    FlushFailed {
        requeued: usize,
        #[source]
        source: StoreError,
    },

    #[error("progress engine has been disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
