//! Audit records and message payloads
//!
//! This module contains everything a firing produces besides the population
//! change itself.
//!
//! # Overview
//!
//! - **LogRecord**: one timestamped audit record (entered, moved, removed,
//!   blocked or cancelled)
//! - **AuditLog**: thread-safe, best-effort append-only log over an
//!   [`AuditSink`] such as [`FileSink`] or [`MemorySink`]
//! - **MessageGenerator**: collaborator producing the payload announced by a
//!   firing, with [`Hl7MessageGenerator`] as the built-in implementation
//!
//! # Usage Example
//!
//! ```rust
//! use patient_flow_simulator::events::*;
//! use chrono::Utc;
//!
//! let sink = MemorySink::new();
//! let log = AuditLog::new(sink.clone());
//!
//! log.append(LogRecord::cancelled(Utc::now()));
//! log.finalize();
//!
//! assert_eq!(sink.records().len(), 1);
//! ```

pub mod audit_log;
pub mod message;
pub mod record;

// Re-export all public types for convenience
pub use audit_log::{AuditLog, AuditSink, AuditSlot, FileSink, MemorySink};
pub use message::{Hl7MessageGenerator, MessageError, MessageGenerator, HL7_VERSION};
pub use record::{LogRecord, TIMESTAMP_FORMAT};
