//! Presence tracking services.
//!
//! Wires the pure domain logic from `pt-core` to the store in `pt-db`:
//! - [`zones`]: monitored-zone registry with a per-group cache
//! - [`ingest`]: the single consumer that owns all session state
//! - [`writer`]: persists finalized intervals off the ingest path
//! - [`query`]: totals, per-zone breakdowns and leaderboards
//! - [`export`]: CSV export of raw intervals

mod error;
pub mod export;
pub mod ingest;
pub mod query;
pub mod writer;
pub mod zones;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use pt_db::Database;

pub use error::TrackerError;
pub use export::{Export, NameResolver, StaticNames, export_intervals, suggested_filename};
pub use ingest::{IngestHandle, IngestReport, IngestStats, IngestTask, start_ingest};
pub use query::{LeaderboardEntry, QueryEngine, ZoneBreakdown, format_duration};
pub use writer::WriterStats;
pub use zones::ZoneRegistry;

/// The store connection shared by ingest, queries and export.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Opens the store for the tracker.
///
/// An unreachable store is reported as [`TrackerError::Configuration`].
pub fn open_shared(path: &Path) -> Result<SharedDatabase, TrackerError> {
    let db = Database::open(path).map_err(TrackerError::Configuration)?;
    Ok(Arc::new(Mutex::new(db)))
}

/// Wraps an already opened database.
#[must_use]
pub fn share(db: Database) -> SharedDatabase {
    Arc::new(Mutex::new(db))
}

pub(crate) fn lock(db: &SharedDatabase) -> Result<MutexGuard<'_, Database>, TrackerError> {
    db.lock().map_err(|_| TrackerError::LockPoisoned)
}
