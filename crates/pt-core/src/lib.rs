//! Core domain logic for the presence tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Session registry: open presence episodes keyed by group, zone and subject
//! - Finalization: turning closed sessions into immutable intervals
//! - Date ranges: calendar dates in the organizational timezone mapped to UTC windows
//! - Ingress commands: transition notifications and overrides from the platform adapter

pub mod command;
pub mod finalize;
pub mod range;
pub mod session;
pub mod types;

pub use command::{IngressCommand, TransitionEvent};
pub use finalize::{Finalized, finalize};
pub use range::{
    DateParsePolicy, DateRange, ORG_OFFSET_SECONDS, TimeWindow, local_midnight_to_utc, org_offset,
    to_org_time,
};
pub use session::{ClosedSession, SessionRegistry};
pub use types::{ClosedInterval, GroupId, SessionKey, SubjectId, ValidationError, ZoneId};
