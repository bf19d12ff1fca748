//! Audit log records
//!
//! This module contains the [`LogRecord`] written for every firing that moves
//! an entity or is blocked, plus the final record of a cancelled run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::Entity;
use crate::types::{BlockReason, EntityId, EventKind, LogAction};

/// Timestamp layout used in text audit logs
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Simulated time of the record
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub action: LogAction,
    /// Entity involved, absent for blocked and cancelled records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// Display name of the entity involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Source state name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Target state name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Message event announced by the firing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKind>,
    /// Why a blocked firing did not move anyone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
    /// Generated message, or an error string when generation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Free-form detail such as an internal error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LogRecord {
    fn base(timestamp: DateTime<Utc>, action: LogAction) -> Self {
        Self {
            timestamp,
            action,
            entity_id: None,
            entity_name: None,
            source: None,
            target: None,
            event: None,
            reason: None,
            message: None,
            detail: None,
        }
    }

    fn with_entity(mut self, entity: &Entity) -> Self {
        self.entity_id = Some(entity.id);
        self.entity_name = Some(entity.full_name());
        self
    }

    /// An entity was admitted into `target`
    pub fn entered(timestamp: DateTime<Utc>, entity: &Entity, target: &str) -> Self {
        let mut record = Self::base(timestamp, LogAction::Entered).with_entity(entity);
        record.target = Some(target.to_string());
        record
    }

    /// An entity moved from `source` to `target`
    pub fn moved(timestamp: DateTime<Utc>, entity: &Entity, source: &str, target: &str) -> Self {
        let mut record = Self::base(timestamp, LogAction::Moved).with_entity(entity);
        record.source = Some(source.to_string());
        record.target = Some(target.to_string());
        record
    }

    /// An entity left the network from `source`
    pub fn removed(timestamp: DateTime<Utc>, entity: &Entity, source: &str) -> Self {
        let mut record = Self::base(timestamp, LogAction::Removed).with_entity(entity);
        record.source = Some(source.to_string());
        record
    }

    /// A firing passed its probability gate but could not move anyone
    pub fn blocked(
        timestamp: DateTime<Utc>,
        source: Option<&str>,
        target: Option<&str>,
        reason: BlockReason,
    ) -> Self {
        let mut record = Self::base(timestamp, LogAction::Blocked);
        record.source = source.map(str::to_string);
        record.target = target.map(str::to_string);
        record.reason = Some(reason);
        record
    }

    /// The run was cancelled by an operator
    pub fn cancelled(timestamp: DateTime<Utc>) -> Self {
        Self::base(timestamp, LogAction::Cancelled)
    }

    /// Attach the announced event
    pub fn with_event(mut self, event: Option<EventKind>) -> Self {
        self.event = event;
        self
    }

    /// Attach the generated message or its error string
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a free-form detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Display label of the entity, e.g. `Maria Silva (ID:000001)`
    fn entity_label(&self) -> String {
        match (&self.entity_name, self.entity_id) {
            (Some(name), Some(id)) => format!("{} (ID:{})", name, id),
            (None, Some(id)) => format!("(ID:{})", id),
            (Some(name), None) => name.clone(),
            (None, None) => "unknown entity".to_string(),
        }
    }

    /// One-line human-readable description of the record
    pub fn description(&self) -> String {
        let source = self.source.as_deref().unwrap_or(crate::topology::ENTRY_NAME);
        let target = self.target.as_deref().unwrap_or(crate::topology::EXIT_NAME);

        let mut line = match self.action {
            LogAction::Entered => format!("Added {} to {}", self.entity_label(), target),
            LogAction::Moved => {
                format!("Moved {} from {} to {}", self.entity_label(), source, target)
            }
            LogAction::Removed => format!("Removed {} from {}", self.entity_label(), source),
            LogAction::Blocked => match self.reason {
                Some(reason) => format!("Blocked {} -> {}: {}", source, target, reason),
                None => format!("Blocked {} -> {}", source, target),
            },
            LogAction::Cancelled => "Simulation cancelled by operator".to_string(),
        };

        if let Some(detail) = &self.detail {
            line.push_str(" (");
            line.push_str(detail);
            line.push(')');
        }
        line
    }

    /// Text rendering: `<timestamp> - <description>` followed by event and message lines
    pub fn to_text(&self) -> String {
        let timestamp = self.timestamp.format(TIMESTAMP_FORMAT);
        let mut text = format!("{} - {}", timestamp, self.description());

        if let Some(event) = self.event {
            text.push_str(&format!("\n{} - HL7 Event: {}", timestamp, event));
        }
        if let Some(message) = &self.message {
            text.push('\n');
            text.push_str(message);
        }
        text
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sex;
    use chrono::{NaiveDate, TimeZone};

    fn patient() -> Entity {
        let dob = NaiveDate::from_ymd_opt(1975, 1, 2).unwrap();
        Entity::new(EntityId(7), "Rui", "Costa", dob, Sex::M)
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 26, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_entered_text_line() {
        let record = LogRecord::entered(noon(), &patient(), "Triage");
        assert_eq!(record.to_text(), "2024-05-26 12:00:00 - Added Rui Costa (ID:000007) to Triage");
    }

    #[test]
    fn test_moved_with_event_and_message() {
        let record = LogRecord::moved(noon(), &patient(), "Triage", "Ward")
            .with_event(Some(EventKind::AdtA02))
            .with_message("MSH|^~\\&|A\nPID|||000007");

        let text = record.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2024-05-26 12:00:00 - Moved Rui Costa (ID:000007) from Triage to Ward");
        assert_eq!(lines[1], "2024-05-26 12:00:00 - HL7 Event: ADT_A02 - Transfer a Patient");
        assert_eq!(lines[2], "MSH|^~\\&|A");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_blocked_ingress_description() {
        let record = LogRecord::blocked(noon(), None, Some("Triage"), BlockReason::TargetFull);
        assert_eq!(record.description(), "Blocked Simulation Entry -> Triage: target at capacity");
        assert!(record.entity_id.is_none());
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let json = serde_json::to_string(&LogRecord::cancelled(noon())).unwrap();
        assert_eq!(json, r#"{"timestamp":"2024-05-26T12:00:00Z","action":"cancelled"}"#);

        let removed = LogRecord::removed(noon(), &patient(), "Checkout");
        let back: LogRecord = serde_json::from_str(&serde_json::to_string(&removed).unwrap()).unwrap();
        assert_eq!(back, removed);
    }
}
