//! Conversion of closed sessions into interval records.

use crate::session::ClosedSession;
use crate::types::{ClosedInterval, SessionKey};

/// Outcome of finalizing a closed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    /// An interval to persist.
    Record(ClosedInterval),
    /// Nothing to persist: the session ended at or before its start.
    Discard,
}

impl Finalized {
    #[must_use]
    pub fn into_record(self) -> Option<ClosedInterval> {
        match self {
            Self::Record(interval) => Some(interval),
            Self::Discard => None,
        }
    }
}

/// Applies the finalization rules to a just-closed session.
///
/// - zero-marked: a zero-length marker at `start`, kept so the episode is still recorded
/// - `end <= start`: discarded (clock skew, instant reconnect)
/// - otherwise: `[start, end)`
#[must_use]
pub fn finalize(key: SessionKey, closed: ClosedSession) -> Finalized {
    let ClosedSession {
        start,
        end,
        zero_marked,
    } = closed;

    let bounds = if zero_marked {
        Some((start, start))
    } else if end <= start {
        None
    } else {
        Some((start, end))
    };

    match bounds.map(|(start, end)| ClosedInterval::new(key, start, end)) {
        Some(Ok(interval)) => Finalized::Record(interval),
        // Both branches above guarantee end >= start.
        Some(Err(_)) | None => Finalized::Discard,
    }
}
