//! Read-only aggregation over stored intervals.
//!
//! An interval matches a date range when it overlaps the range's UTC window,
//! and a matched interval contributes its full duration even when it extends
//! past either boundary.

use pt_core::{DateParsePolicy, DateRange, GroupId, SubjectId, ZoneId};
use pt_db::IntervalFilter;
use serde::Serialize;

use crate::{SharedDatabase, TrackerError, lock};

/// Total time a subject spent in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneBreakdown {
    pub zone_id: ZoneId,
    pub seconds: i64,
}

/// One row of a group leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub subject_id: SubjectId,
    pub seconds: i64,
}

pub struct QueryEngine {
    db: SharedDatabase,
    policy: DateParsePolicy,
}

impl QueryEngine {
    #[must_use]
    pub const fn new(db: SharedDatabase, policy: DateParsePolicy) -> Self {
        Self { db, policy }
    }

    /// Parses raw `YYYY-MM-DD` bounds with this engine's policy.
    pub fn range(&self, from: Option<&str>, to: Option<&str>) -> Result<DateRange, TrackerError> {
        Ok(DateRange::parse(from, to, self.policy)?)
    }

    /// Total seconds a subject spent in any monitored zone.
    pub fn total_for_subject(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        range: &DateRange,
    ) -> Result<i64, TrackerError> {
        let filter = IntervalFilter::group(group_id.clone())
            .subject(subject_id.clone())
            .window(range.window());
        let total_ms = lock(&self.db)?.total_duration_ms(&filter)?;
        tracing::debug!(group = %group_id, subject = %subject_id, %range, total_ms, "subject total");
        Ok(total_ms / 1000)
    }

    /// Per-zone totals for a subject, largest first.
    pub fn per_zone_breakdown(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        range: &DateRange,
        top_n: usize,
    ) -> Result<Vec<ZoneBreakdown>, TrackerError> {
        let filter = IntervalFilter::group(group_id.clone())
            .subject(subject_id.clone())
            .window(range.window());
        let totals = lock(&self.db)?.zone_totals(&filter, top_n)?;
        if totals.is_empty() {
            return Err(TrackerError::not_found(format!(
                "zone records for subject {subject_id} ({range})"
            )));
        }
        Ok(totals
            .into_iter()
            .map(|total| ZoneBreakdown {
                zone_id: total.zone_id,
                seconds: total.duration_ms / 1000,
            })
            .collect())
    }

    /// Subjects ranked by total time in the group, largest first.
    pub fn leaderboard(
        &self,
        group_id: &GroupId,
        range: &DateRange,
        top_n: usize,
    ) -> Result<Vec<LeaderboardEntry>, TrackerError> {
        let filter = IntervalFilter::group(group_id.clone()).window(range.window());
        let totals = lock(&self.db)?.subject_totals(&filter, top_n)?;
        if totals.is_empty() {
            return Err(TrackerError::not_found(format!(
                "records for group {group_id} ({range})"
            )));
        }
        Ok(totals
            .into_iter()
            .enumerate()
            .map(|(index, total)| LeaderboardEntry {
                rank: index + 1,
                subject_id: total.subject_id,
                seconds: total.duration_ms / 1000,
            })
            .collect())
    }

    /// Number of intervals the aggregation queries would consider.
    pub fn match_count(
        &self,
        group_id: &GroupId,
        subject_id: Option<&SubjectId>,
        range: &DateRange,
    ) -> Result<i64, TrackerError> {
        let filter = IntervalFilter::group(group_id.clone())
            .maybe_subject(subject_id.cloned())
            .window(range.window());
        Ok(lock(&self.db)?.count_intervals(&filter)?)
    }
}

/// Formats whole seconds as `"Xh Ym Zs"`, `"Ym Zs"` or `"Zs"`.
/// Negative input renders as `"0s"`.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
