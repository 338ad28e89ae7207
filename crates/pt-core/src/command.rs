//! Commands delivered to the ingest worker by the platform adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, SubjectId, ZoneId};

/// A subject moved between zones, joined one, or left one.
///
/// A single notification may carry both sides, representing a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub group_id: GroupId,
    pub subject_id: SubjectId,
    /// Bots and system accounts are never tracked.
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_zone_id: Option<ZoneId>,
    /// When the transition happened. Defaults to the instant it is processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl TransitionEvent {
    /// True when both sides name the same zone (a state update within one zone).
    #[must_use]
    pub fn is_same_zone(&self) -> bool {
        matches!(
            (&self.left_zone_id, &self.joined_zone_id),
            (Some(left), Some(joined)) if left == joined
        )
    }
}

/// Everything that mutates tracker state, serialized through one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngressCommand {
    Transition(TransitionEvent),
    /// Force the subject's current session to record zero duration.
    ///
    /// `zone_id` names the zone explicitly when the tracker has no open session
    /// for the subject (it was already present when the process started).
    MarkZero {
        group_id: GroupId,
        subject_id: SubjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zone_id: Option<ZoneId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<DateTime<Utc>>,
    },
    UnmarkZero {
        group_id: GroupId,
        subject_id: SubjectId,
    },
    RegisterZone {
        group_id: GroupId,
        zone_id: ZoneId,
    },
    UnregisterZone {
        group_id: GroupId,
        zone_id: ZoneId,
    },
}

impl IngressCommand {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transition(_) => "transition",
            Self::MarkZero { .. } => "mark_zero",
            Self::UnmarkZero { .. } => "unmark_zero",
            Self::RegisterZone { .. } => "register_zone",
            Self::UnregisterZone { .. } => "unregister_zone",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_parses_from_json_line() {
        let line = r#"{"type":"transition","group_id":"1","subject_id":"7","left_zone_id":"10","joined_zone_id":"11","at":"2024-01-01T00:00:00Z"}"#;
        let command: IngressCommand = serde_json::from_str(line).unwrap();
        let IngressCommand::Transition(event) = command else {
            panic!("expected transition");
        };
        assert!(!event.is_bot);
        assert_eq!(event.left_zone_id.unwrap().as_str(), "10");
        assert_eq!(event.joined_zone_id.unwrap().as_str(), "11");
    }

    #[test]
    fn override_commands_parse() {
        let command: IngressCommand =
            serde_json::from_str(r#"{"type":"mark_zero","group_id":"1","subject_id":"7"}"#).unwrap();
        assert_eq!(command.kind(), "mark_zero");
        let command: IngressCommand =
            serde_json::from_str(r#"{"type":"unmark_zero","group_id":"1","subject_id":"7"}"#)
                .unwrap();
        assert_eq!(command.kind(), "unmark_zero");
    }

    #[test]
    fn empty_ids_are_rejected() {
        let result: Result<IngressCommand, _> =
            serde_json::from_str(r#"{"type":"register_zone","group_id":"","zone_id":"3"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn same_zone_detection() {
        let event = TransitionEvent {
            group_id: GroupId::new("1").unwrap(),
            subject_id: SubjectId::new("7").unwrap(),
            is_bot: false,
            left_zone_id: Some(ZoneId::new("10").unwrap()),
            joined_zone_id: Some(ZoneId::new("10").unwrap()),
            at: None,
        };
        assert!(event.is_same_zone());
    }
}
