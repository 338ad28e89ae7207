//! CSV export of raw intervals.
//!
//! Rows are selected with the same filter the aggregation queries use, so an
//! export always has exactly as many rows as the intervals a total counted.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use pt_core::{DateRange, GroupId, SubjectId, ZoneId, to_org_time};
use pt_db::IntervalFilter;
use serde::Deserialize;

use crate::{SharedDatabase, TrackerError, lock};

const HEADER: &str = "zone_id,zone_name,subject_id,subject_name,start,end,duration_seconds";
const UNKNOWN_ZONE: &str = "(unknown zone)";
const UNKNOWN_SUBJECT: &str = "(unknown member)";

/// Best-effort lookup of display names.
pub trait NameResolver {
    fn zone_name(&self, group_id: &GroupId, zone_id: &ZoneId) -> Option<String>;
    fn subject_name(&self, group_id: &GroupId, subject_id: &SubjectId) -> Option<String>;
}

/// Names from a fixed table keyed by ID, e.g. loaded from config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticNames {
    #[serde(default)]
    pub zones: HashMap<String, String>,
    #[serde(default)]
    pub subjects: HashMap<String, String>,
}

impl NameResolver for StaticNames {
    fn zone_name(&self, _group_id: &GroupId, zone_id: &ZoneId) -> Option<String> {
        self.zones.get(zone_id.as_str()).cloned()
    }

    fn subject_name(&self, _group_id: &GroupId, subject_id: &SubjectId) -> Option<String> {
        self.subjects.get(subject_id.as_str()).cloned()
    }
}

/// A rendered export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub row_count: usize,
}

/// Renders every interval matching the filter as CSV.
///
/// No matches still yields the header row.
pub fn export_intervals(
    db: &SharedDatabase,
    names: &dyn NameResolver,
    group_id: &GroupId,
    subject_id: Option<&SubjectId>,
    range: &DateRange,
) -> Result<Export, TrackerError> {
    let filter = IntervalFilter::group(group_id.clone())
        .maybe_subject(subject_id.cloned())
        .window(range.window());
    let records = lock(db)?.list_intervals(&filter)?;
    if records.is_empty() {
        tracing::info!(%group_id, %range, "no intervals to export");
    }

    let mut csv = String::with_capacity(64 * (records.len() + 1));
    csv.push_str(HEADER);
    csv.push_str("\r\n");
    for record in &records {
        let interval = &record.interval;
        let zone_name = names
            .zone_name(group_id, interval.zone_id())
            .unwrap_or_else(|| UNKNOWN_ZONE.to_string());
        let subject_name = names
            .subject_name(group_id, interval.subject_id())
            .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string());
        let fields = [
            interval.zone_id().to_string(),
            zone_name,
            interval.subject_id().to_string(),
            subject_name,
            format_local(interval.start()),
            format_local(interval.end()),
            interval.duration_seconds().to_string(),
        ];
        for (index, field) in fields.iter().enumerate() {
            if index > 0 {
                csv.push(',');
            }
            push_field(&mut csv, field);
        }
        csv.push_str("\r\n");
    }

    let filename = suggested_filename(group_id, subject_id, range);
    tracing::info!(%filename, rows = records.len(), "export rendered");
    Ok(Export {
        filename,
        bytes: csv.into_bytes(),
        row_count: records.len(),
    })
}

/// `presence_<group>[_<subject>]_<from|all>_<to|all>.csv`
#[must_use]
pub fn suggested_filename(
    group_id: &GroupId,
    subject_id: Option<&SubjectId>,
    range: &DateRange,
) -> String {
    let mut name = format!("presence_{group_id}");
    if let Some(subject_id) = subject_id {
        let _ = write!(name, "_{subject_id}");
    }
    let bound = |date: Option<chrono::NaiveDate>| {
        date.map_or_else(|| "all".to_string(), |d| d.format("%Y%m%d").to_string())
    };
    let _ = write!(name, "_{}_{}.csv", bound(range.from_date()), bound(range.to_date()));
    name
}

fn format_local(instant: DateTime<Utc>) -> String {
    to_org_time(instant).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryEngine;
    use crate::share;
    use insta::assert_snapshot;
    use pt_core::{ClosedInterval, DateParsePolicy, SessionKey};
    use pt_db::Database;

    fn group() -> GroupId {
        GroupId::new("g1").unwrap()
    }

    fn interval(subject: &str, zone: &str, start: &str, end: &str) -> ClosedInterval {
        ClosedInterval::new(
            SessionKey::new(
                group(),
                ZoneId::new(zone).unwrap(),
                SubjectId::new(subject).unwrap(),
            ),
            start.parse().unwrap(),
            end.parse().unwrap(),
        )
        .unwrap()
    }

    fn seeded() -> SharedDatabase {
        let mut db = Database::open_in_memory().unwrap();
        for iv in [
            interval("u1", "z1", "2024-01-01T23:00:00Z", "2024-01-02T01:00:00Z"),
            interval("u2", "z2", "2024-01-02T03:00:00Z", "2024-01-02T03:00:45Z"),
            interval("u1", "z2", "2024-01-05T00:00:00Z", "2024-01-05T00:01:00Z"),
        ] {
            db.insert_interval(&iv).unwrap();
        }
        share(db)
    }

    fn names() -> StaticNames {
        StaticNames {
            zones: HashMap::from([("z1".to_string(), "Study, Room \"A\"".to_string())]),
            subjects: HashMap::from([("u1".to_string(), "alice".to_string())]),
        }
    }

    #[test]
    fn renders_local_times_and_placeholders() {
        let range = DateRange::parse(Some("2024-01-02"), Some("2024-01-02"), DateParsePolicy::Strict)
            .unwrap();
        let export = export_intervals(&seeded(), &names(), &group(), None, &range).unwrap();
        assert_eq!(export.row_count, 2);
        assert_eq!(export.filename, "presence_g1_20240102_20240102.csv");
        let text = String::from_utf8(export.bytes).unwrap().replace("\r\n", "\n");
        let text = text.trim_end();
        assert_snapshot!(text, @r#"
        zone_id,zone_name,subject_id,subject_name,start,end,duration_seconds
        z1,"Study, Room ""A""",u1,alice,2024-01-02 08:00:00,2024-01-02 10:00:00,7200
        z2,(unknown zone),u2,(unknown member),2024-01-02 12:00:00,2024-01-02 12:00:45,45
        "#);
    }

    #[test]
    fn row_count_matches_aggregation_count() {
        let db = seeded();
        let engine = QueryEngine::new(db.clone(), DateParsePolicy::Strict);
        let u1 = SubjectId::new("u1").unwrap();
        for range in [
            DateRange::Unbounded,
            engine.range(Some("2024-01-02"), None).unwrap(),
            engine.range(None, Some("2024-01-02")).unwrap(),
            // No matches on either side.
            engine.range(Some("2030-01-01"), None).unwrap(),
            engine.range(None, Some("2023-12-31")).unwrap(),
        ] {
            let export = export_intervals(&db, &names(), &group(), Some(&u1), &range).unwrap();
            let count = engine.match_count(&group(), Some(&u1), &range).unwrap();
            assert_eq!(i64::try_from(export.row_count).unwrap(), count, "range {range}");
        }
    }

    #[test]
    fn empty_export_is_header_only() {
        let range = DateRange::parse(Some("2030-01-01"), None, DateParsePolicy::Strict).unwrap();
        let export =
            export_intervals(&seeded(), &StaticNames::default(), &group(), None, &range).unwrap();
        assert_eq!(export.row_count, 0);
        assert_eq!(export.bytes, format!("{HEADER}\r\n").into_bytes());
        assert_eq!(export.filename, "presence_g1_20300101_all.csv");

        let empty_store = share(Database::open_in_memory().unwrap());
        let export = export_intervals(
            &empty_store,
            &StaticNames::default(),
            &group(),
            None,
            &DateRange::Unbounded,
        )
        .unwrap();
        assert_eq!(export.row_count, 0);
    }

    #[test]
    fn filename_uses_all_for_open_bounds() {
        let u1 = SubjectId::new("u1").unwrap();
        let from = DateRange::From("2024-03-01".parse().unwrap());
        assert_eq!(
            suggested_filename(&group(), Some(&u1), &from),
            "presence_g1_u1_20240301_all.csv"
        );
        assert_eq!(
            suggested_filename(&group(), None, &DateRange::Unbounded),
            "presence_g1_all_all.csv"
        );
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        let mut out = String::new();
        push_field(&mut out, "plain");
        push_field(&mut out, "a\nb");
        assert_eq!(out, "plain\"a\nb\"");
    }
}
