//! In-memory registry of open presence sessions.
//!
//! The registry holds at most one open session per [`SessionKey`]. Sessions are
//! memory-only: anything still open when the process exits is lost.
//!
//! # State machine (per key)
//!
//! | From   | Call        | To     | Effect                          |
//! |--------|-------------|--------|---------------------------------|
//! | NONE   | `open`      | OPEN   | start recorded                  |
//! | OPEN   | `open`      | OPEN   | ignored, original start kept    |
//! | OPEN   | `close`     | NONE   | returns [`ClosedSession`]       |
//! | NONE   | `close`     | NONE   | returns `None`                  |
//! | NONE   | `mark_zero` | OPEN   | session synthesized at `now`    |
//!
//! The zero-mark flag is orthogonal to OPEN and is dropped on close.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::types::{GroupId, SessionKey, SubjectId, ZoneId};

/// A session removed from the registry by [`SessionRegistry::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedSession {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub zero_marked: bool,
}

/// Open sessions and zero-mark flags.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    open: HashMap<SessionKey, DateTime<Utc>>,
    zero_marked: HashSet<SessionKey>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session unless one is already open for `key`.
    ///
    /// Returns `true` if a new session was recorded. A duplicate enter
    /// notification must not reset the start, or elapsed time would be lost.
    pub fn open(&mut self, key: SessionKey, at: DateTime<Utc>) -> bool {
        if self.open.contains_key(&key) {
            tracing::debug!(%key, "duplicate open ignored");
            return false;
        }
        // Stale flag from an earlier session at this key.
        self.zero_marked.remove(&key);
        self.open.insert(key, at);
        true
    }

    /// Closes the session for `key`, returning its start and zero-mark state.
    pub fn close(&mut self, key: &SessionKey, at: DateTime<Utc>) -> Option<ClosedSession> {
        let start = self.open.remove(key)?;
        let zero_marked = self.zero_marked.remove(key);
        Some(ClosedSession {
            start,
            end: at,
            zero_marked,
        })
    }

    /// Closes every session open in one zone.
    pub fn close_zone(
        &mut self,
        group_id: &GroupId,
        zone_id: &ZoneId,
        at: DateTime<Utc>,
    ) -> Vec<(SessionKey, ClosedSession)> {
        let mut keys: Vec<SessionKey> = self
            .open
            .keys()
            .filter(|key| &key.group_id == group_id && &key.zone_id == zone_id)
            .cloned()
            .collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| {
                let closed = self.close(&key, at)?;
                Some((key, closed))
            })
            .collect()
    }

    /// Flags the session for zero-duration treatment.
    ///
    /// If nothing is open for `key` (the subject was already present when the
    /// process started), a session starting at `now` is synthesized first.
    /// Returns `true` when such a session was synthesized.
    pub fn mark_zero(&mut self, key: SessionKey, now: DateTime<Utc>) -> bool {
        let synthesized = if self.open.contains_key(&key) {
            false
        } else {
            self.open.insert(key.clone(), now);
            true
        };
        self.zero_marked.insert(key);
        synthesized
    }

    /// Clears the zero-mark flag. Returns `true` if a flag was cleared.
    pub fn unmark_zero(&mut self, key: &SessionKey) -> bool {
        self.zero_marked.remove(key)
    }

    #[must_use]
    pub fn start_of(&self, key: &SessionKey) -> Option<DateTime<Utc>> {
        self.open.get(key).copied()
    }

    #[must_use]
    pub fn is_zero_marked(&self, key: &SessionKey) -> bool {
        self.zero_marked.contains(key)
    }

    /// Finds the zone a subject currently has an open session in.
    ///
    /// If the subject somehow has several, the most recently opened wins.
    #[must_use]
    pub fn current_zone(&self, group_id: &GroupId, subject_id: &SubjectId) -> Option<ZoneId> {
        self.open
            .iter()
            .filter(|(key, _)| &key.group_id == group_id && &key.subject_id == subject_id)
            .max_by(|(a_key, a_start), (b_key, b_start)| {
                a_start
                    .cmp(b_start)
                    .then_with(|| b_key.zone_id.cmp(&a_key.zone_id))
            })
            .map(|(key, _)| key.zone_id.clone())
    }

    /// Snapshot of open sessions ordered by start time.
    #[must_use]
    pub fn open_sessions(&self) -> Vec<(SessionKey, DateTime<Utc>)> {
        let mut sessions: Vec<_> = self
            .open
            .iter()
            .map(|(key, start)| (key.clone(), *start))
            .collect();
        sessions.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        sessions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
