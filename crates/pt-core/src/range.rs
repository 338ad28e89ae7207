//! Calendar date ranges in the organizational timezone and their UTC windows.
//!
//! Query parameters are plain dates (`YYYY-MM-DD`) interpreted at a fixed
//! UTC+9 offset with no daylight-saving rules. A range maps to a half-open UTC
//! window: the `from` date becomes its local midnight (inclusive) and the `to`
//! date becomes the *following* local midnight (exclusive).

use std::fmt;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// Offset of the organizational timezone from UTC, in seconds.
pub const ORG_OFFSET_SECONDS: i32 = 9 * 3600;

/// Years a date bound may name. Their UTC windows render as four-digit
/// RFC 3339 text, which the store compares lexicographically.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// The organizational timezone as a chrono offset.
#[must_use]
pub fn org_offset() -> FixedOffset {
    FixedOffset::east_opt(ORG_OFFSET_SECONDS).expect("UTC+9 is within the valid offset range")
}

/// How malformed date strings are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateParsePolicy {
    /// Malformed dates and inverted ranges are rejected.
    #[default]
    Strict,
    /// Malformed dates leave that side of the range unbounded.
    Lenient,
}

/// A calendar date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    Unbounded,
    From(NaiveDate),
    To(NaiveDate),
    Between(NaiveDate, NaiveDate),
}

impl DateRange {
    #[must_use]
    pub const fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        match (from, to) {
            (None, None) => Self::Unbounded,
            (Some(from), None) => Self::From(from),
            (None, Some(to)) => Self::To(to),
            (Some(from), Some(to)) => Self::Between(from, to),
        }
    }

    /// Parses optional `YYYY-MM-DD` bounds. Empty strings count as absent.
    pub fn parse(
        from: Option<&str>,
        to: Option<&str>,
        policy: DateParsePolicy,
    ) -> Result<Self, ValidationError> {
        let from = parse_bound(from, policy)?;
        let to = parse_bound(to, policy)?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to && policy == DateParsePolicy::Strict {
                return Err(ValidationError::InvertedRange {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(Self::new(from, to))
    }

    #[must_use]
    pub const fn from_date(&self) -> Option<NaiveDate> {
        match self {
            Self::From(from) | Self::Between(from, _) => Some(*from),
            Self::Unbounded | Self::To(_) => None,
        }
    }

    #[must_use]
    pub const fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Self::To(to) | Self::Between(_, to) => Some(*to),
            Self::Unbounded | Self::From(_) => None,
        }
    }

    /// The half-open UTC window covered by this range.
    #[must_use]
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.from_date().and_then(local_midnight_to_utc),
            end: self
                .to_date()
                .and_then(|to| to.succ_opt())
                .and_then(local_midnight_to_utc),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("all time"),
            Self::From(from) => write!(f, "{from} onward"),
            Self::To(to) => write!(f, "through {to}"),
            Self::Between(from, to) => write!(f, "{from} to {to}"),
        }
    }
}

fn parse_bound(
    value: Option<&str>,
    policy: DateParsePolicy,
) -> Result<Option<NaiveDate>, ValidationError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let parsed = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| err.to_string())
        .and_then(|date| {
            if YEARS.contains(&date.year()) {
                Ok(date)
            } else {
                Err(format!("year {} is outside {YEARS:?}", date.year()))
            }
        });
    match parsed {
        Ok(date) => Ok(Some(date)),
        Err(error) => match policy {
            DateParsePolicy::Strict => Err(ValidationError::InvalidDate {
                value: value.to_string(),
            }),
            DateParsePolicy::Lenient => {
                tracing::warn!(value, %error, "ignoring unparseable date bound");
                Ok(None)
            }
        },
    }
}

/// Converts an organizational-timezone date at midnight to UTC.
///
/// `None` when the instant falls before the earliest date chrono represents.
#[must_use]
pub fn local_midnight_to_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    let utc = midnight.checked_sub_signed(Duration::seconds(i64::from(ORG_OFFSET_SECONDS)))?;
    Some(DateTime::from_naive_utc_and_offset(utc, Utc))
}

/// Renders a UTC instant in the organizational timezone.
#[must_use]
pub fn to_org_time(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    instant.with_timezone(&org_offset())
}

/// A half-open UTC window `[start, end)`; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub const UNBOUNDED: Self = Self {
        start: None,
        end: None,
    };

    /// Overlap test for an interval `[start, end)`: `end > S AND start < E`.
    ///
    /// A matching interval counts in full; nothing here clips it to the window.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start.is_none_or(|window_start| end > window_start)
            && self.end.is_none_or(|window_end| start < window_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn single_day_maps_to_shifted_utc_window() {
        let range = DateRange::new(Some(date("2024-01-02")), Some(date("2024-01-02")));
        let window = range.window();
        assert_eq!(window.start, Some(ts("2024-01-01T15:00:00Z")));
        assert_eq!(window.end, Some(ts("2024-01-02T15:00:00Z")));
    }

    #[test]
    fn open_sides_stay_unbounded() {
        let window = DateRange::From(date("2024-03-01")).window();
        assert_eq!(window.start, Some(ts("2024-02-29T15:00:00Z")));
        assert!(window.end.is_none());

        let window = DateRange::To(date("2024-03-01")).window();
        assert!(window.start.is_none());
        assert_eq!(window.end, Some(ts("2024-03-01T15:00:00Z")));

        assert_eq!(DateRange::Unbounded.window(), TimeWindow::UNBOUNDED);
    }

    #[test]
    fn overlap_includes_straddling_interval() {
        let window = DateRange::new(Some(date("2024-01-02")), Some(date("2024-01-02"))).window();
        assert!(window.overlaps(ts("2024-01-01T23:00:00Z"), ts("2024-01-02T01:00:00Z")));
    }

    #[test]
    fn overlap_is_half_open() {
        let window = TimeWindow {
            start: Some(ts("2024-01-01T15:00:00Z")),
            end: Some(ts("2024-01-02T15:00:00Z")),
        };
        // Ends exactly at the window start.
        assert!(!window.overlaps(ts("2024-01-01T14:00:00Z"), ts("2024-01-01T15:00:00Z")));
        // Starts exactly at the window end.
        assert!(!window.overlaps(ts("2024-01-02T15:00:00Z"), ts("2024-01-02T16:00:00Z")));
        // Starts exactly at the window start.
        assert!(window.overlaps(ts("2024-01-01T15:00:00Z"), ts("2024-01-01T15:30:00Z")));
    }

    #[test]
    fn zero_length_interval_inside_window_overlaps() {
        let window = TimeWindow {
            start: Some(ts("2024-01-01T15:00:00Z")),
            end: Some(ts("2024-01-02T15:00:00Z")),
        };
        let at = ts("2024-01-02T00:00:00Z");
        assert!(window.overlaps(at, at));
    }

    #[test]
    fn strict_parse_rejects_malformed_date() {
        let result = DateRange::parse(Some("2024-13-01"), None, DateParsePolicy::Strict);
        assert_eq!(
            result,
            Err(ValidationError::InvalidDate {
                value: "2024-13-01".to_string()
            })
        );
    }

    #[test]
    fn strict_parse_rejects_years_outside_four_digits() {
        for value in ["-262143-01-01", "0000-06-01", "10000-01-01", "+12345-01-01"] {
            let result = DateRange::parse(Some(value), None, DateParsePolicy::Strict);
            assert_eq!(
                result,
                Err(ValidationError::InvalidDate {
                    value: value.to_string()
                }),
                "{value}"
            );
        }
        let range = DateRange::parse(Some("0001-01-01"), Some("9999-12-31"), DateParsePolicy::Strict)
            .unwrap();
        let window = range.window();
        assert_eq!(window.start, Some(ts("0000-12-31T15:00:00Z")));
        assert_eq!(window.end, Some(ts("9999-12-31T15:00:00Z")));
    }

    #[test]
    fn lenient_parse_drops_out_of_range_year() {
        let range = DateRange::parse(Some("-262143-01-01"), None, DateParsePolicy::Lenient).unwrap();
        assert_eq!(range, DateRange::Unbounded);
    }

    #[test]
    fn earliest_date_has_no_utc_midnight() {
        assert_eq!(local_midnight_to_utc(NaiveDate::MIN), None);
        let window = DateRange::From(NaiveDate::MIN).window();
        assert!(window.start.is_none());
    }

    #[test]
    fn lenient_parse_treats_malformed_date_as_unbounded() {
        let range = DateRange::parse(Some("yesterday"), Some("2024-01-05"), DateParsePolicy::Lenient)
            .unwrap();
        assert_eq!(range, DateRange::To(date("2024-01-05")));
    }

    #[test]
    fn strict_parse_rejects_inverted_range() {
        let result = DateRange::parse(Some("2024-02-01"), Some("2024-01-01"), DateParsePolicy::Strict);
        assert!(matches!(result, Err(ValidationError::InvertedRange { .. })));
    }

    #[test]
    fn blank_bounds_are_absent() {
        let range = DateRange::parse(Some(""), Some("  "), DateParsePolicy::Strict).unwrap();
        assert_eq!(range, DateRange::Unbounded);
    }

    #[test]
    fn org_time_rendering_uses_plus_nine() {
        let local = to_org_time(ts("2024-01-01T15:00:00Z"));
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-02 00:00:00");
    }

    #[test]
    fn range_display() {
        assert_eq!(DateRange::Unbounded.to_string(), "all time");
        assert_eq!(
            DateRange::Between(date("2024-01-01"), date("2024-01-31")).to_string(),
            "2024-01-01 to 2024-01-31"
        );
    }
}
