//! Enumeration types for the flow simulator
//!
//! This module contains the closed enumerations used throughout the simulation:
//! the catalogue of message events attached to transitions, audit log actions,
//! block reasons, run phases and output formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message events a transition can announce when it moves an entity
///
/// The catalogue is closed: an event tag in a topology either names one of
/// these kinds or the topology is rejected at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// ADT^A01 admit/visit notification
    #[serde(rename = "ADT_A01")]
    AdtA01,
    /// ADT^A02 patient transfer
    #[serde(rename = "ADT_A02")]
    AdtA02,
    /// ADT^A03 discharge/end visit
    #[serde(rename = "ADT_A03")]
    AdtA03,
    /// ORM^O01 general order
    #[serde(rename = "ORM_O01")]
    OrmO01,
    /// ORU^R01 unsolicited observation result
    #[serde(rename = "ORU_R01")]
    OruR01,
}

impl EventKind {
    /// Every event kind, in catalogue order
    pub const ALL: [EventKind; 5] = [
        EventKind::AdtA01,
        EventKind::AdtA02,
        EventKind::AdtA03,
        EventKind::OrmO01,
        EventKind::OruR01,
    ];

    /// Short code such as `ADT_A01`
    pub fn code(&self) -> &'static str {
        match self {
            EventKind::AdtA01 => "ADT_A01",
            EventKind::AdtA02 => "ADT_A02",
            EventKind::AdtA03 => "ADT_A03",
            EventKind::OrmO01 => "ORM_O01",
            EventKind::OruR01 => "ORU_R01",
        }
    }

    /// Human-readable description of the event
    pub fn description(&self) -> &'static str {
        match self {
            EventKind::AdtA01 => "Admit/visit Notification",
            EventKind::AdtA02 => "Transfer a Patient",
            EventKind::AdtA03 => "Discharge/End Visit",
            EventKind::OrmO01 => "General Order",
            EventKind::OruR01 => "Unsolicited transmission of an observation message",
        }
    }

    /// Message type component (MSH-9.1)
    pub fn message_code(&self) -> &'static str {
        match self {
            EventKind::AdtA01 | EventKind::AdtA02 | EventKind::AdtA03 => "ADT",
            EventKind::OrmO01 => "ORM",
            EventKind::OruR01 => "ORU",
        }
    }

    /// Trigger event component (MSH-9.2)
    pub fn trigger_event(&self) -> &'static str {
        match self {
            EventKind::AdtA01 => "A01",
            EventKind::AdtA02 => "A02",
            EventKind::AdtA03 => "A03",
            EventKind::OrmO01 => "O01",
            EventKind::OruR01 => "R01",
        }
    }

    /// Parse an event label as written in topology files
    ///
    /// Only the first whitespace-separated token is significant, so
    /// `"ADT_A01 - Admit/visit Notification"` and `"ADT_A01"` are equivalent.
    /// Empty labels and `"No event"` mean the transition carries no event.
    pub fn from_label(label: &str) -> Result<Option<Self>, String> {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("no event") {
            return Ok(None);
        }
        let token = trimmed.split_whitespace().next().unwrap_or(trimmed);
        token.parse().map(Some)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.description())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('^', "_").as_str() {
            "ADT_A01" => Ok(EventKind::AdtA01),
            "ADT_A02" => Ok(EventKind::AdtA02),
            "ADT_A03" => Ok(EventKind::AdtA03),
            "ORM_O01" => Ok(EventKind::OrmO01),
            "ORU_R01" => Ok(EventKind::OruR01),
            _ => Err(format!("Unknown event: {}", s)),
        }
    }
}

/// Kind of an audit log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    /// An entity was admitted through the ingress transition
    Entered,
    /// An entity moved between two states
    Moved,
    /// An entity left through an egress transition
    Removed,
    /// A firing passed its probability gate but was not feasible
    Blocked,
    /// The run was cancelled by an operator
    Cancelled,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogAction::Entered => write!(f, "entered"),
            LogAction::Moved => write!(f, "moved"),
            LogAction::Removed => write!(f, "removed"),
            LogAction::Blocked => write!(f, "blocked"),
            LogAction::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a firing that passed its probability gate did not move anyone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The target state is at capacity
    TargetFull,
    /// The source state holds no entity
    SourceEmpty,
    /// Internal bookkeeping for a referenced state was missing
    MissingState,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::TargetFull => write!(f, "target at capacity"),
            BlockReason::SourceEmpty => write!(f, "source empty"),
            BlockReason::MissingState => write!(f, "missing state bookkeeping"),
        }
    }
}

/// Lifecycle phase of a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Built but not started yet
    Idle,
    /// All transitions fire on their schedules
    Running,
    /// Every live entity reached the end state; only egress transitions fire
    Draining,
    /// Scheduler shut down, no further firings
    Stopped,
}

impl RunStatus {
    /// Whether the run reached its terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped)
    }

    /// Whether a firing may change the population in this phase
    ///
    /// Everything fires while running; only egress transitions fire while
    /// draining; nothing fires before start or after stop.
    pub fn permits(&self, egress: bool) -> bool {
        match self {
            RunStatus::Running => true,
            RunStatus::Draining => egress,
            RunStatus::Idle | RunStatus::Stopped => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "IDLE"),
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Draining => write!(f, "DRAINING"),
            RunStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Output format of the audit log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogFormat {
    /// One `<timestamp> - <description>` line per record
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// File extension used for audit logs in this format
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Text => "txt",
            LogFormat::Json => "jsonl",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "TEXT"),
            LogFormat::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(LogFormat::Text),
            "json" | "jsonl" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Administrative sex of a generated patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    /// Male
    M,
    /// Female
    F,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::M => write!(f, "M"),
            Sex::F => write!(f, "F"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_label() {
        assert_eq!(
            EventKind::from_label("ADT_A01 - Admit/visit Notification").unwrap(),
            Some(EventKind::AdtA01)
        );
        assert_eq!(EventKind::from_label("oru_r01").unwrap(), Some(EventKind::OruR01));
        assert_eq!(EventKind::from_label("ORM^O01").unwrap(), Some(EventKind::OrmO01));
        assert_eq!(EventKind::from_label("No event").unwrap(), None);
        assert_eq!(EventKind::from_label("  ").unwrap(), None);
        assert!(EventKind::from_label("ADT_A99 - Made up").is_err());
    }

    #[test]
    fn test_event_kind_display_round_trips_through_label() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_label(&kind.to_string()).unwrap(), Some(kind));
        }
    }

    #[test]
    fn test_event_kind_message_parts() {
        assert_eq!(EventKind::AdtA02.message_code(), "ADT");
        assert_eq!(EventKind::AdtA02.trigger_event(), "A02");
        assert_eq!(EventKind::OruR01.message_code(), "ORU");
        assert_eq!(EventKind::OrmO01.trigger_event(), "O01");
    }

    #[test]
    fn test_log_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogAction::Blocked).unwrap(), "\"blocked\"");
        assert_eq!(LogAction::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_run_status_terminal() {
        assert_eq!(serde_json::to_string(&RunStatus::Draining).unwrap(), "\"DRAINING\"");
        assert!(RunStatus::Stopped.is_terminal());
        assert!(!RunStatus::Draining.is_terminal());
    }

    #[test]
    fn test_run_status_permits() {
        assert!(RunStatus::Running.permits(false));
        assert!(RunStatus::Draining.permits(true));
        assert!(!RunStatus::Draining.permits(false));
        assert!(!RunStatus::Stopped.permits(true));
        assert!(!RunStatus::Idle.permits(true));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!(LogFormat::Json.extension(), "jsonl");
        assert!("csv".parse::<LogFormat>().is_err());
    }
}
