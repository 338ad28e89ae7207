use pt_core::ValidationError;
use pt_db::DbError;
use thiserror::Error;

/// Errors surfaced by the tracker services.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The store could not be opened or loaded at startup.
    #[error("persistence store unavailable")]
    Configuration(#[source] DbError),
    /// A query target, zone or open session does not exist.
    #[error("{what} not found")]
    NotFound { what: String },
    /// A read or write against the store failed.
    #[error("storage error")]
    Storage(#[from] DbError),
    /// Malformed input such as a bad date.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Another thread panicked while holding the store.
    #[error("database lock poisoned")]
    LockPoisoned,
    /// The ingest or writer queue has shut down.
    #[error("{0} queue closed")]
    QueueClosed(&'static str),
    /// A worker task panicked or was cancelled.
    #[error("worker task failed")]
    Worker(#[from] tokio::task::JoinError),
}

impl TrackerError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}
