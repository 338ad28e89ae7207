//! Interval writer - persists finalized intervals off the ingest path.
//!
//! The ingest worker hands each finalized interval to this worker through a
//! bounded channel and moves on without waiting for the write. By the time an
//! interval reaches here its session is already gone from the registry: a
//! failed write is a lost interval, reported at error severity and counted,
//! never retried.

use pt_core::ClosedInterval;
use tokio::sync::mpsc;

use crate::{SharedDatabase, TrackerError, lock};

/// Counters reported when the writer stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub written: u64,
    pub failed: u64,
}

/// Worker that appends intervals to the store until its channel closes.
pub struct IntervalWriter {
    db: SharedDatabase,
    interval_rx: mpsc::Receiver<ClosedInterval>,
    stats: WriterStats,
}

impl IntervalWriter {
    pub const fn new(db: SharedDatabase, interval_rx: mpsc::Receiver<ClosedInterval>) -> Self {
        Self {
            db,
            interval_rx,
            stats: WriterStats {
                written: 0,
                failed: 0,
            },
        }
    }

    /// Runs on a blocking thread; `rusqlite` calls are synchronous.
    pub fn run_blocking(mut self) -> WriterStats {
        tracing::info!("interval_writer_started");

        while let Some(interval) = self.interval_rx.blocking_recv() {
            self.write(&interval);
        }

        tracing::info!(
            written = self.stats.written,
            failed = self.stats.failed,
            "interval_writer_stopped"
        );
        self.stats
    }

    fn write(&mut self, interval: &ClosedInterval) {
        let result = lock(&self.db)
            .and_then(|mut db| db.insert_interval(interval).map_err(TrackerError::from));
        match result {
            Ok(_) => self.stats.written += 1,
            Err(err) => {
                self.stats.failed += 1;
                tracing::error!(
                    key = %interval.key(),
                    start = %interval.start(),
                    end = %interval.end(),
                    error = %err,
                    "interval lost: write failed"
                );
            }
        }
    }
}

/// Create an interval channel and writer.
///
/// Returns the sender (for the ingest worker) and the writer (to be spawned).
pub fn create_interval_writer(
    db: SharedDatabase,
    buffer_size: usize,
) -> (mpsc::Sender<ClosedInterval>, IntervalWriter) {
    let (interval_tx, interval_rx) = mpsc::channel(buffer_size);
    let writer = IntervalWriter::new(db, interval_rx);
    (interval_tx, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::share;
    use chrono::{DateTime, Utc};
    use pt_core::{GroupId, SessionKey, SubjectId, ZoneId};
    use pt_db::{Database, IntervalFilter};

    fn interval() -> ClosedInterval {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2024-01-01T00:01:00Z".parse().unwrap();
        ClosedInterval::new(
            SessionKey::new(
                GroupId::new("g1").unwrap(),
                ZoneId::new("z1").unwrap(),
                SubjectId::new("u1").unwrap(),
            ),
            start,
            end,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn writer_persists_until_channel_closes() {
        let db = share(Database::open_in_memory().unwrap());
        let (tx, writer) = create_interval_writer(db.clone(), 4);
        let handle = tokio::task::spawn_blocking(move || writer.run_blocking());

        tx.send(interval()).await.unwrap();
        tx.send(interval()).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats, WriterStats { written: 2, failed: 0 });
        let count = db
            .lock()
            .unwrap()
            .count_intervals(&IntervalFilter::group(GroupId::new("g1").unwrap()))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn failed_writes_are_counted_not_retried() {
        let db = share(Database::open_in_memory().unwrap());
        let poisoner = db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the store lock");
        })
        .join();

        let (tx, writer) = create_interval_writer(db, 4);
        let handle = tokio::task::spawn_blocking(move || writer.run_blocking());
        tx.send(interval()).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats, WriterStats { written: 0, failed: 1 });
    }
}
