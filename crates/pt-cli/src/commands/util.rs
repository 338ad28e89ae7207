//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use pt_core::{DateRange, GroupId, SubjectId, ZoneId};
use pt_tracker::{NameResolver, QueryEngine, TrackerError};

use crate::RangeArgs;

pub fn parse_group(raw: &str) -> Result<GroupId> {
    GroupId::new(raw).with_context(|| format!("invalid group ID {raw:?}"))
}

pub fn parse_subject(raw: &str) -> Result<SubjectId> {
    SubjectId::new(raw).with_context(|| format!("invalid subject ID {raw:?}"))
}

pub fn parse_zone(raw: &str) -> Result<ZoneId> {
    ZoneId::new(raw).with_context(|| format!("invalid zone ID {raw:?}"))
}

pub fn parse_range(engine: &QueryEngine, args: &RangeArgs) -> Result<DateRange> {
    engine
        .range(args.from.as_deref(), args.to.as_deref())
        .context("invalid date range")
}

/// `"Name (id)"` when a display name is known, otherwise the bare ID.
pub fn zone_label(names: &dyn NameResolver, group_id: &GroupId, zone_id: &ZoneId) -> String {
    names
        .zone_name(group_id, zone_id)
        .map_or_else(|| zone_id.to_string(), |name| format!("{name} ({zone_id})"))
}

pub fn subject_label(
    names: &dyn NameResolver,
    group_id: &GroupId,
    subject_id: &SubjectId,
) -> String {
    names
        .subject_name(group_id, subject_id)
        .map_or_else(|| subject_id.to_string(), |name| format!("{name} ({subject_id})"))
}

/// Turns [`TrackerError::NotFound`] into `None` so commands can render
/// "no records" instead of failing.
pub fn found<T>(result: Result<T, TrackerError>) -> Result<Option<T>, TrackerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(TrackerError::NotFound { what }) => {
            tracing::debug!(%what, "query matched nothing");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
