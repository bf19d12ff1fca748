//! Message generation collaborator
//!
//! A [`MessageGenerator`] turns an entity, an event kind and a simulated
//! timestamp into an opaque payload that the engine only logs.
//! [`Hl7MessageGenerator`] is the built-in implementation and emits
//! pipe-delimited HL7 v2.5.1 segments.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entity::Entity;
use crate::types::EventKind;

/// HL7 version written to MSH-12
pub const HL7_VERSION: &str = "2.5.1";

const HL7_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Errors raised while building a message
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessageError {
    /// The generator has no template for this event
    #[error("No message template for event {0}")]
    UnsupportedEvent(String),

    /// A field value cannot be encoded
    #[error("Cannot encode field {field}: {reason}")]
    Encoding {
        /// Segment and field, e.g. `PID-5`
        field: String,
        /// What was wrong with the value
        reason: String,
    },
}

/// Produces the payload announced by a firing
///
/// Called from trigger tasks after the state locks are released; a failure is
/// logged in place of the payload and never undoes the move.
pub trait MessageGenerator: Send + Sync {
    /// Build the message for `entity` and `event` at `timestamp`
    fn generate(
        &self,
        entity: &Entity,
        event: EventKind,
        timestamp: DateTime<Utc>,
    ) -> Result<String, MessageError>;
}

/// One HL7 segment under construction
#[derive(Debug)]
struct Segment {
    name: &'static str,
    fields: Vec<String>,
}

impl Segment {
    fn new(name: &'static str) -> Self {
        Self { name, fields: Vec::new() }
    }

    /// Set field `position` (1-based, as numbered in the HL7 tables)
    fn field(mut self, position: usize, value: impl Into<String>) -> Self {
        if self.fields.len() < position {
            self.fields.resize(position, String::new());
        }
        self.fields[position - 1] = value.into();
        self
    }

    fn encode(&self) -> String {
        // MSH-1 is the field separator itself
        let fields = if self.name == "MSH" { &self.fields[1..] } else { &self.fields[..] };
        let mut encoded = String::from(self.name);
        for value in fields {
            encoded.push('|');
            encoded.push_str(value);
        }
        encoded
    }
}

/// Escape HL7 delimiters in a free-text value
fn escape(field: &str, value: &str) -> Result<String, MessageError> {
    if value.chars().any(|c| c.is_control()) {
        return Err(MessageError::Encoding {
            field: field.to_string(),
            reason: "control characters are not allowed".to_string(),
        });
    }

    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\E\\"),
            '|' => escaped.push_str("\\F\\"),
            '^' => escaped.push_str("\\S\\"),
            '&' => escaped.push_str("\\T\\"),
            '~' => escaped.push_str("\\R\\"),
            other => escaped.push(other),
        }
    }
    Ok(escaped)
}

/// Built-in HL7 v2 message generator
#[derive(Debug)]
pub struct Hl7MessageGenerator {
    sending_application: String,
    sending_facility: String,
    receiving_application: String,
    receiving_facility: String,
    next_control_id: AtomicU64,
}

impl Hl7MessageGenerator {
    /// Create a generator with default application and facility names
    pub fn new() -> Self {
        Self {
            sending_application: "PatientFlowSimulator".to_string(),
            sending_facility: "SimulatedHospital".to_string(),
            receiving_application: "ReceivingSystem".to_string(),
            receiving_facility: "ReceivingFacility".to_string(),
            next_control_id: AtomicU64::new(1),
        }
    }

    /// Override the sending application and facility (MSH-3, MSH-4)
    pub fn with_sender(mut self, application: impl Into<String>, facility: impl Into<String>) -> Self {
        self.sending_application = application.into();
        self.sending_facility = facility.into();
        self
    }

    /// Override the receiving application and facility (MSH-5, MSH-6)
    pub fn with_receiver(mut self, application: impl Into<String>, facility: impl Into<String>) -> Self {
        self.receiving_application = application.into();
        self.receiving_facility = facility.into();
        self
    }

    fn msh(&self, event: EventKind, control_id: u64, timestamp: &str) -> Segment {
        Segment::new("MSH")
            .field(1, "|")
            .field(2, "^~\\&")
            .field(3, self.sending_application.as_str())
            .field(4, self.sending_facility.as_str())
            .field(5, self.receiving_application.as_str())
            .field(6, self.receiving_facility.as_str())
            .field(7, timestamp)
            .field(
                9,
                format!("{}^{}^{}", event.message_code(), event.trigger_event(), event.code()),
            )
            .field(10, control_id.to_string())
            .field(11, "P")
            .field(12, HL7_VERSION)
    }

    fn pid(entity: &Entity) -> Result<Segment, MessageError> {
        let name = format!(
            "{}^{}",
            escape("PID-5.1", &entity.last_name)?,
            escape("PID-5.2", &entity.first_name)?
        );
        Ok(Segment::new("PID")
            .field(1, "1")
            .field(3, entity.id.to_string())
            .field(5, name)
            .field(7, entity.date_of_birth.format("%Y%m%d").to_string())
            .field(8, entity.sex.to_string()))
    }

    fn evn(event: EventKind, timestamp: &str) -> Segment {
        Segment::new("EVN").field(1, event.trigger_event()).field(2, timestamp)
    }

    fn order_detail() -> Segment {
        Segment::new("OBR").field(1, "1").field(4, "Test^Test Description")
    }
}

impl Default for Hl7MessageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageGenerator for Hl7MessageGenerator {
    fn generate(
        &self,
        entity: &Entity,
        event: EventKind,
        timestamp: DateTime<Utc>,
    ) -> Result<String, MessageError> {
        let control_id = self.next_control_id.fetch_add(1, Ordering::Relaxed);
        let ts = timestamp.format(HL7_TIMESTAMP_FORMAT).to_string();

        let msh = self.msh(event, control_id, &ts);
        let pid = Self::pid(entity)?;

        let segments = match event {
            EventKind::AdtA01 => vec![
                msh,
                Self::evn(event, &ts),
                pid,
                Segment::new("PV1")
                    .field(1, "1")
                    .field(2, "I")
                    .field(3, "ICU")
                    .field(4, "EMER")
                    .field(44, ts.as_str()),
            ],
            EventKind::AdtA02 => vec![
                msh,
                Self::evn(event, &ts),
                pid,
                Segment::new("PV1").field(1, "1").field(2, "I").field(3, "Ward1").field(4, "E"),
            ],
            EventKind::AdtA03 => vec![
                msh,
                Self::evn(event, &ts),
                pid,
                Segment::new("PV1")
                    .field(1, "1")
                    .field(2, "I")
                    .field(3, "Ward1")
                    .field(4, "E")
                    .field(45, ts.as_str()),
            ],
            EventKind::OrmO01 => vec![
                msh,
                pid,
                Segment::new("PV1").field(1, "1").field(2, "I"),
                Segment::new("ORC")
                    .field(1, "NW")
                    .field(2, format!("P{:06}", control_id))
                    .field(3, format!("F{:06}", control_id)),
                Self::order_detail(),
            ],
            EventKind::OruR01 => vec![
                msh,
                pid,
                Segment::new("ORC").field(1, "RE"),
                Self::order_detail(),
                Segment::new("OBX")
                    .field(1, "1")
                    .field(2, "TX")
                    .field(3, "12345^Observation")
                    .field(5, "Observation Value")
                    .field(11, "F"),
            ],
        };

        Ok(segments.iter().map(Segment::encode).collect::<Vec<_>>().join("\n"))
    }
}
