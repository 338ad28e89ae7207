//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A calendar date did not match `YYYY-MM-DD`.
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// The lower date bound is after the upper one.
    #[error("date range is inverted: {from} is after {to}")]
    InvertedRange { from: String, to: String },

    /// An interval would end before it starts.
    #[error("interval ends before it starts: {start} > {end}")]
    InvalidInterval { start: String, end: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

define_string_id!(
    /// A validated group (community/server) identifier.
    ///
    /// Platform snowflakes are carried as decimal strings.
    GroupId, "group ID"
);

define_string_id!(
    /// A validated zone identifier.
    ///
    /// Zones are the locations (voice channels) a subject can be present in.
    ZoneId, "zone ID"
);

define_string_id!(
    /// A validated subject (member) identifier.
    SubjectId, "subject ID"
);

/// Identifies a single presence episode slot: one subject in one zone of one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub group_id: GroupId,
    pub zone_id: ZoneId,
    pub subject_id: SubjectId,
}

impl SessionKey {
    #[must_use]
    pub const fn new(group_id: GroupId, zone_id: ZoneId, subject_id: SubjectId) -> Self {
        Self {
            group_id,
            zone_id,
            subject_id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group_id, self.zone_id, self.subject_id)
    }
}

/// An immutable presence record `[start, end)`.
///
/// `end == start` only for zero-marked sessions; construction rejects `end < start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedInterval {
    key: SessionKey,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ClosedInterval {
    /// Creates an interval, rejecting one that ends before it starts.
    pub fn new(
        key: SessionKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { key, start, end })
    }

    #[must_use]
    pub const fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub const fn group_id(&self) -> &GroupId {
        &self.key.group_id
    }

    #[must_use]
    pub const fn zone_id(&self) -> &ZoneId {
        &self.key.zone_id
    }

    #[must_use]
    pub const fn subject_id(&self) -> &SubjectId {
        &self.key.subject_id
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Full duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_milliseconds()
    }

    /// Full duration in whole seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_seconds()
    }
}
