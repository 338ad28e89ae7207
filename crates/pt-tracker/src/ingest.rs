//! Event ingress: the single consumer that owns all session state.
//!
//! The platform adapter pushes [`IngressCommand`]s into a bounded channel
//! through an [`IngestHandle`]. One [`IngestWorker`] drains it in order, so
//! the close-then-open pair of a transition is never interleaved with another
//! notification for the same key. Finalized intervals are forwarded to the
//! [`IntervalWriter`](crate::writer::IntervalWriter); the worker does not wait
//! for the write.
//!
//! A failing command is logged and counted; it never stops the loop.

use chrono::{DateTime, Timelike, Utc};
use pt_core::{
    ClosedInterval, ClosedSession, Finalized, GroupId, IngressCommand, SessionKey,
    SessionRegistry, SubjectId, TransitionEvent, ZoneId, finalize,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::writer::{WriterStats, create_interval_writer};
use crate::zones::ZoneRegistry;
use crate::{SharedDatabase, TrackerError};

/// Counters reported when the ingest worker stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub commands: u64,
    pub failed_commands: u64,
    pub ignored_bot_events: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub intervals_forwarded: u64,
    pub intervals_discarded: u64,
    /// Finalized intervals that could not be handed to the writer.
    pub intervals_unsent: u64,
    /// Sessions still open at shutdown; their time is not recorded.
    pub open_sessions_dropped: u64,
}

/// Final counters from both workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub ingest: IngestStats,
    pub writer: WriterStats,
}

impl IngestReport {
    /// Intervals that were finalized but never reached the store.
    #[must_use]
    pub const fn lost_intervals(&self) -> u64 {
        self.writer.failed + self.ingest.intervals_unsent
    }
}

/// Owns the session and zone registries and applies commands in order.
pub struct IngestWorker {
    sessions: SessionRegistry,
    zones: ZoneRegistry,
    interval_tx: mpsc::Sender<ClosedInterval>,
    stats: IngestStats,
}

impl IngestWorker {
    #[must_use]
    pub fn new(zones: ZoneRegistry, interval_tx: mpsc::Sender<ClosedInterval>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            zones,
            interval_tx,
            stats: IngestStats::default(),
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[must_use]
    pub const fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Drains the command channel. Runs on a blocking thread.
    pub fn run_blocking(mut self, mut command_rx: mpsc::Receiver<IngressCommand>) -> IngestStats {
        tracing::info!("ingest_worker_started");

        while let Some(command) = command_rx.blocking_recv() {
            let kind = command.kind();
            if let Err(err) = self.handle(command) {
                tracing::warn!(command = kind, error = %err, "ingest command failed");
            }
        }

        self.shutdown()
    }

    fn shutdown(mut self) -> IngestStats {
        let open = self.sessions.open_sessions();
        for (key, start) in &open {
            tracing::warn!(%key, %start, "open session dropped at shutdown");
        }
        self.stats.open_sessions_dropped = u64::try_from(open.len()).unwrap_or(u64::MAX);
        tracing::info!(
            commands = self.stats.commands,
            failed = self.stats.failed_commands,
            forwarded = self.stats.intervals_forwarded,
            "ingest_worker_stopped"
        );
        self.stats
    }

    /// Applies one command.
    pub fn handle(&mut self, command: IngressCommand) -> Result<(), TrackerError> {
        self.stats.commands += 1;
        let result = match command {
            IngressCommand::Transition(event) => self.transition(event),
            IngressCommand::MarkZero {
                group_id,
                subject_id,
                zone_id,
                at,
            } => self.mark_zero(group_id, subject_id, zone_id, received_at(at)),
            IngressCommand::UnmarkZero {
                group_id,
                subject_id,
            } => self.unmark_zero(&group_id, &subject_id),
            IngressCommand::RegisterZone { group_id, zone_id } => {
                self.zones.register(&group_id, &zone_id).map(|_| ())
            }
            IngressCommand::UnregisterZone { group_id, zone_id } => {
                self.unregister_zone(&group_id, &zone_id)
            }
        };
        if result.is_err() {
            self.stats.failed_commands += 1;
        }
        result
    }

    fn transition(&mut self, event: TransitionEvent) -> Result<(), TrackerError> {
        if event.is_bot {
            self.stats.ignored_bot_events += 1;
            return Ok(());
        }
        if event.is_same_zone() {
            return Ok(());
        }
        let at = received_at(event.at);
        let TransitionEvent {
            group_id,
            subject_id,
            left_zone_id,
            joined_zone_id,
            ..
        } = event;

        if let Some(zone_id) = left_zone_id {
            if self.zones.is_monitored(&group_id, &zone_id)? {
                let key = SessionKey::new(group_id.clone(), zone_id, subject_id.clone());
                if let Some(closed) = self.sessions.close(&key, at) {
                    self.stats.sessions_closed += 1;
                    self.forward(key, closed)?;
                } else {
                    tracing::debug!(%key, "leave without open session");
                }
            }
        }

        if let Some(zone_id) = joined_zone_id {
            if self.zones.is_monitored(&group_id, &zone_id)? {
                let key = SessionKey::new(group_id, zone_id, subject_id);
                if self.sessions.open(key, at) {
                    self.stats.sessions_opened += 1;
                }
            }
        }

        Ok(())
    }

    fn mark_zero(
        &mut self,
        group_id: GroupId,
        subject_id: SubjectId,
        zone_id: Option<ZoneId>,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let zone_id = match self.sessions.current_zone(&group_id, &subject_id) {
            Some(current) => current,
            None => {
                let Some(zone_id) = zone_id else {
                    return Err(TrackerError::not_found(format!(
                        "open session for subject {subject_id}"
                    )));
                };
                if !self.zones.is_monitored(&group_id, &zone_id)? {
                    return Err(TrackerError::not_found(format!("monitored zone {zone_id}")));
                }
                zone_id
            }
        };
        let key = SessionKey::new(group_id, zone_id, subject_id);
        if self.sessions.mark_zero(key.clone(), now) {
            self.stats.sessions_opened += 1;
            tracing::info!(%key, "session synthesized for zero-mark");
        }
        tracing::info!(%key, "zero-mark set");
        Ok(())
    }

    fn unmark_zero(&mut self, group_id: &GroupId, subject_id: &SubjectId) -> Result<(), TrackerError> {
        let Some(zone_id) = self.sessions.current_zone(group_id, subject_id) else {
            return Err(TrackerError::not_found(format!(
                "open session for subject {subject_id}"
            )));
        };
        let key = SessionKey::new(group_id.clone(), zone_id, subject_id.clone());
        let cleared = self.sessions.unmark_zero(&key);
        tracing::info!(%key, cleared, "zero-mark cleared");
        Ok(())
    }

    fn unregister_zone(&mut self, group_id: &GroupId, zone_id: &ZoneId) -> Result<(), TrackerError> {
        self.zones.unregister(group_id, zone_id)?;
        // Leave events for this zone are ignored from now on.
        let closed = self.sessions.close_zone(group_id, zone_id, received_at(None));
        let mut result = Ok(());
        for (key, session) in closed {
            self.stats.sessions_closed += 1;
            if let Err(err) = self.forward(key, session) {
                result = Err(err);
            }
        }
        result
    }

    fn forward(&mut self, key: SessionKey, closed: ClosedSession) -> Result<(), TrackerError> {
        match finalize(key, closed) {
            Finalized::Record(interval) => {
                if let Err(mpsc::error::SendError(interval)) = self.interval_tx.blocking_send(interval) {
                    tracing::error!(
                        key = %interval.key(),
                        start = %interval.start(),
                        end = %interval.end(),
                        "interval lost: writer unavailable"
                    );
                    self.stats.intervals_unsent += 1;
                    return Err(TrackerError::QueueClosed("interval"));
                }
                self.stats.intervals_forwarded += 1;
            }
            Finalized::Discard => {
                self.stats.intervals_discarded += 1;
                tracing::debug!(start = %closed.start, end = %closed.end, "non-positive interval discarded");
            }
        }
        Ok(())
    }
}

/// The instant a command takes effect, at the millisecond precision the
/// store keeps. A close less than 1ms after its open is then an instant
/// reconnect, not a zero-length interval.
fn received_at(at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let at = at.unwrap_or_else(Utc::now);
    at.with_nanosecond(at.timestamp_subsec_millis() * 1_000_000)
        .unwrap_or(at)
}

/// Sending side of the ingest queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    command_tx: mpsc::Sender<IngressCommand>,
}

impl IngestHandle {
    /// Queues a command, waiting for capacity when the queue is full.
    pub async fn send(&self, command: IngressCommand) -> Result<(), TrackerError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| TrackerError::QueueClosed("ingest"))
    }

    pub async fn transition(&self, event: TransitionEvent) -> Result<(), TrackerError> {
        self.send(IngressCommand::Transition(event)).await
    }

    pub async fn mark_zero(&self, group_id: GroupId, subject_id: SubjectId) -> Result<(), TrackerError> {
        self.send(IngressCommand::MarkZero {
            group_id,
            subject_id,
            zone_id: None,
            at: None,
        })
        .await
    }

    pub async fn unmark_zero(&self, group_id: GroupId, subject_id: SubjectId) -> Result<(), TrackerError> {
        self.send(IngressCommand::UnmarkZero {
            group_id,
            subject_id,
        })
        .await
    }

    pub async fn register_zone(&self, group_id: GroupId, zone_id: ZoneId) -> Result<(), TrackerError> {
        self.send(IngressCommand::RegisterZone { group_id, zone_id })
            .await
    }
}

/// Join handles for the ingest and writer workers.
pub struct IngestTask {
    ingest: JoinHandle<IngestStats>,
    writer: JoinHandle<WriterStats>,
}

impl IngestTask {
    /// Waits for both workers to drain. Drop every [`IngestHandle`] first.
    pub async fn finish(self) -> Result<IngestReport, TrackerError> {
        let ingest = self.ingest.await?;
        let writer = self.writer.await?;
        let report = IngestReport { ingest, writer };
        if report.lost_intervals() > 0 {
            tracing::error!(lost = report.lost_intervals(), "intervals were lost during ingest");
        }
        Ok(report)
    }
}

/// Starts the ingest pipeline on the current Tokio runtime.
///
/// Every known group's zones are loaded before any command is accepted; a
/// store that cannot be read is reported as a configuration error.
pub fn start_ingest(
    db: SharedDatabase,
    queue_capacity: usize,
) -> Result<(IngestHandle, IngestTask), TrackerError> {
    let mut zones = ZoneRegistry::new(db.clone());
    zones.load_all().map_err(|err| match err {
        TrackerError::Storage(source) => TrackerError::Configuration(source),
        other => other,
    })?;

    let capacity = queue_capacity.max(1);
    let (interval_tx, writer) = create_interval_writer(db, capacity);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let worker = IngestWorker::new(zones, interval_tx);

    let writer = tokio::task::spawn_blocking(move || writer.run_blocking());
    let ingest = tokio::task::spawn_blocking(move || worker.run_blocking(command_rx));

    Ok((IngestHandle { command_tx }, IngestTask { ingest, writer }))
}
