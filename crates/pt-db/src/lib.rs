//! Storage layer for the presence tracker.
//!
//! Provides persistence for monitored zones and closed presence intervals
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The tracker shares one instance behind a `Mutex`; queries and ingest writes take
//! turns on the same connection.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). The fixed width keeps lexicographic
//! ordering identical to chronological ordering, which the range filters rely on.
//!
//! ## Append-only intervals
//!
//! `closed_intervals` is a log: rows are inserted once and never updated or
//! deleted by this crate. `duration_ms` is derived at insert time so aggregates
//! can sum a column instead of parsing timestamps.

mod filter;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use pt_core::{ClosedInterval, GroupId, SessionKey, SubjectId, ValidationError, ZoneId};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use thiserror::Error;

pub use filter::IntervalFilter;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for interval {record_id}: {timestamp}")]
    TimestampParse {
        record_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row no longer satisfies the domain invariants.
    #[error("invalid stored record {record_id}")]
    InvalidRecord {
        record_id: i64,
        #[source]
        source: ValidationError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A persisted interval with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalRecord {
    pub id: i64,
    pub interval: ClosedInterval,
}

/// Summed duration for one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneTotal {
    pub zone_id: ZoneId,
    pub duration_ms: i64,
    pub interval_count: i64,
}

/// Summed duration for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTotal {
    pub subject_id: SubjectId,
    pub duration_ms: i64,
    pub interval_count: i64,
}

/// Row counts for `pt status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub zone_count: i64,
    pub interval_count: i64,
    pub last_interval_end: Option<String>,
}

#[derive(Debug)]
struct IntervalRow {
    id: i64,
    group_id: String,
    zone_id: String,
    subject_id: String,
    start_utc: String,
    end_utc: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS monitored_zones (
                group_id TEXT NOT NULL,
                zone_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (group_id, zone_id)
            );

            -- Closed presence intervals: append-only log
            -- start_utc / end_utc: RFC 3339 UTC, millisecond precision
            -- end_utc == start_utc only for zero-marked sessions
            CREATE TABLE IF NOT EXISTS closed_intervals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                zone_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                start_utc TEXT NOT NULL,
                end_utc TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                CHECK (end_utc >= start_utc),
                CHECK (duration_ms >= 0)
            );

            CREATE INDEX IF NOT EXISTS idx_intervals_subject
                ON closed_intervals(group_id, subject_id);
            CREATE INDEX IF NOT EXISTS idx_intervals_subject_zone
                ON closed_intervals(group_id, subject_id, zone_id);
            CREATE INDEX IF NOT EXISTS idx_intervals_group_start
                ON closed_intervals(group_id, start_utc);
            ",
        )?;
        Ok(())
    }

    // ========== Monitored zones ==========

    /// Registers a zone for tracking. Returns `false` if it was already registered.
    pub fn register_zone(
        &mut self,
        group_id: &GroupId,
        zone_id: &ZoneId,
        at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO monitored_zones (group_id, zone_id, created_at) VALUES (?, ?, ?)",
            params![group_id.as_str(), zone_id.as_str(), format_timestamp(at)],
        )?;
        Ok(inserted > 0)
    }

    /// Removes a zone registration. Intervals already recorded for it are kept.
    pub fn unregister_zone(&mut self, group_id: &GroupId, zone_id: &ZoneId) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM monitored_zones WHERE group_id = ? AND zone_id = ?",
            params![group_id.as_str(), zone_id.as_str()],
        )?;
        Ok(deleted > 0)
    }

    /// Lists monitored zones for a group ordered by ID.
    pub fn list_zones(&self, group_id: &GroupId) -> Result<Vec<ZoneId>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT zone_id FROM monitored_zones WHERE group_id = ? ORDER BY zone_id ASC",
        )?;
        let rows = stmt.query_map([group_id.as_str()], |row| row.get::<_, String>(0))?;
        let mut zones = Vec::new();
        for row in rows {
            let zone = row?;
            // Primary key columns are written from validated ids.
            if let Ok(zone_id) = ZoneId::new(zone) {
                zones.push(zone_id);
            }
        }
        Ok(zones)
    }

    /// Lists every group that has at least one monitored zone.
    pub fn list_zone_groups(&self) -> Result<Vec<GroupId>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT group_id FROM monitored_zones ORDER BY group_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut groups = Vec::new();
        for row in rows {
            if let Ok(group_id) = GroupId::new(row?) {
                groups.push(group_id);
            }
        }
        Ok(groups)
    }

    // ========== Intervals ==========

    /// Appends a closed interval and returns its row id.
    pub fn insert_interval(&mut self, interval: &ClosedInterval) -> Result<i64, DbError> {
        self.conn.execute(
            "
            INSERT INTO closed_intervals
            (group_id, zone_id, subject_id, start_utc, end_utc, duration_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                interval.group_id().as_str(),
                interval.zone_id().as_str(),
                interval.subject_id().as_str(),
                format_timestamp(interval.start()),
                format_timestamp(interval.end()),
                interval.duration_ms(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, key = %interval.key(), duration_ms = interval.duration_ms(), "interval appended");
        Ok(id)
    }

    /// Sums full durations of every interval matching the filter.
    pub fn total_duration_ms(&self, filter: &IntervalFilter) -> Result<i64, DbError> {
        let (clause, params) = filter.to_sql();
        let query =
            format!("SELECT COALESCE(SUM(duration_ms), 0) FROM closed_intervals WHERE {clause}");
        let total = self
            .conn
            .query_row(&query, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(total)
    }

    /// Counts intervals matching the filter.
    pub fn count_intervals(&self, filter: &IntervalFilter) -> Result<i64, DbError> {
        let (clause, params) = filter.to_sql();
        let query = format!("SELECT COUNT(*) FROM closed_intervals WHERE {clause}");
        let count = self
            .conn
            .query_row(&query, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count)
    }

    /// Per-zone totals, largest first, ties broken by zone ID.
    pub fn zone_totals(
        &self,
        filter: &IntervalFilter,
        limit: usize,
    ) -> Result<Vec<ZoneTotal>, DbError> {
        let (clause, params) = filter.to_sql();
        let query = format!(
            "
            SELECT zone_id, SUM(duration_ms) AS total_ms, COUNT(*)
            FROM closed_intervals
            WHERE {clause}
            GROUP BY zone_id
            ORDER BY total_ms DESC, zone_id ASC
            LIMIT {limit}
            "
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut totals = Vec::new();
        for row in rows {
            let (zone, duration_ms, interval_count) = row?;
            if let Ok(zone_id) = ZoneId::new(zone) {
                totals.push(ZoneTotal {
                    zone_id,
                    duration_ms,
                    interval_count,
                });
            }
        }
        Ok(totals)
    }

    /// Per-subject totals, largest first, ties broken by subject ID.
    pub fn subject_totals(
        &self,
        filter: &IntervalFilter,
        limit: usize,
    ) -> Result<Vec<SubjectTotal>, DbError> {
        let (clause, params) = filter.to_sql();
        let query = format!(
            "
            SELECT subject_id, SUM(duration_ms) AS total_ms, COUNT(*)
            FROM closed_intervals
            WHERE {clause}
            GROUP BY subject_id
            ORDER BY total_ms DESC, subject_id ASC
            LIMIT {limit}
            "
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut totals = Vec::new();
        for row in rows {
            let (subject, duration_ms, interval_count) = row?;
            if let Ok(subject_id) = SubjectId::new(subject) {
                totals.push(SubjectTotal {
                    subject_id,
                    duration_ms,
                    interval_count,
                });
            }
        }
        Ok(totals)
    }

    /// Lists matching intervals ordered by start time then row id.
    pub fn list_intervals(&self, filter: &IntervalFilter) -> Result<Vec<IntervalRecord>, DbError> {
        let (clause, params) = filter.to_sql();
        let query = format!(
            "
            SELECT id, group_id, zone_id, subject_id, start_utc, end_utc
            FROM closed_intervals
            WHERE {clause}
            ORDER BY start_utc ASC, id ASC
            "
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok(IntervalRow {
                id: row.get(0)?,
                group_id: row.get(1)?,
                zone_id: row.get(2)?,
                subject_id: row.get(3)?,
                start_utc: row.get(4)?,
                end_utc: row.get(5)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(interval_from_row(row?)?);
        }
        Ok(records)
    }

    /// Row counts across the whole store.
    pub fn summary(&self) -> Result<StoreSummary, DbError> {
        let zone_count = self
            .conn
            .query_row("SELECT COUNT(*) FROM monitored_zones", [], |row| row.get(0))?;
        let interval_count =
            self.conn
                .query_row("SELECT COUNT(*) FROM closed_intervals", [], |row| row.get(0))?;
        let last_interval_end = self
            .conn
            .query_row("SELECT MAX(end_utc) FROM closed_intervals", [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten();
        Ok(StoreSummary {
            zone_count,
            interval_count,
            last_interval_end,
        })
    }
}

fn interval_from_row(row: IntervalRow) -> Result<IntervalRecord, DbError> {
    let id = row.id;
    let start = parse_timestamp(&row.start_utc, id)?;
    let end = parse_timestamp(&row.end_utc, id)?;
    let invalid = |source| DbError::InvalidRecord {
        record_id: id,
        source,
    };
    let key = SessionKey::new(
        GroupId::new(row.group_id).map_err(invalid)?,
        ZoneId::new(row.zone_id).map_err(invalid)?,
        SubjectId::new(row.subject_id).map_err(invalid)?,
    );
    let interval = ClosedInterval::new(key, start, end).map_err(invalid)?;
    Ok(IntervalRecord { id, interval })
}

fn parse_timestamp(timestamp: &str, record_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
