//! Range-bounded interval filters.
//!
//! [`IntervalFilter`] renders a parameterised `WHERE` clause for the
//! `closed_intervals` table and mirrors the same predicate in memory, so the
//! overlap semantics can be checked without a database.

use pt_core::{ClosedInterval, GroupId, SubjectId, TimeWindow, ZoneId};

use crate::format_timestamp;

/// Selects intervals by owner and overlap with a UTC window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalFilter {
    pub group_id: GroupId,
    pub subject_id: Option<SubjectId>,
    pub zone_id: Option<ZoneId>,
    pub window: TimeWindow,
}

impl IntervalFilter {
    /// All intervals in a group.
    #[must_use]
    pub const fn group(group_id: GroupId) -> Self {
        Self {
            group_id,
            subject_id: None,
            zone_id: None,
            window: TimeWindow::UNBOUNDED,
        }
    }

    #[must_use]
    pub fn subject(mut self, subject_id: SubjectId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    #[must_use]
    pub fn maybe_subject(mut self, subject_id: Option<SubjectId>) -> Self {
        self.subject_id = subject_id;
        self
    }

    #[must_use]
    pub fn zone(mut self, zone_id: ZoneId) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    #[must_use]
    pub const fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Renders the `WHERE` clause body and its positional parameters.
    #[must_use]
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["group_id = ?"];
        let mut params = vec![self.group_id.to_string()];

        if let Some(subject_id) = &self.subject_id {
            clauses.push("subject_id = ?");
            params.push(subject_id.to_string());
        }
        if let Some(zone_id) = &self.zone_id {
            clauses.push("zone_id = ?");
            params.push(zone_id.to_string());
        }
        if let Some(start) = self.window.start {
            clauses.push("end_utc > ?");
            params.push(format_timestamp(start));
        }
        if let Some(end) = self.window.end {
            clauses.push("start_utc < ?");
            params.push(format_timestamp(end));
        }

        (clauses.join(" AND "), params)
    }

    /// In-memory equivalent of [`Self::to_sql`].
    #[must_use]
    pub fn matches(&self, interval: &ClosedInterval) -> bool {
        interval.group_id() == &self.group_id
            && self
                .subject_id
                .as_ref()
                .is_none_or(|subject| interval.subject_id() == subject)
            && self
                .zone_id
                .as_ref()
                .is_none_or(|zone| interval.zone_id() == zone)
            && self.window.overlaps(interval.start(), interval.end())
    }
}
