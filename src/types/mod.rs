//! Core types and identifiers for the flow simulator
//!
//! This module contains fundamental types, identifiers, and configuration structures
//! used throughout the simulation system.
//!
//! # Overview
//!
//! - **Identifiers**: entity identifiers from an injectable atomic generator, run
//!   identifiers and state indices
//! - **Enums**: the closed event catalogue, audit actions, run phases and formats
//! - **Configuration**: simulation configuration with validation and CLI support
//!
//! # Usage Example
//!
//! ```rust
//! use patient_flow_simulator::types::*;
//!
//! let ids = IdGenerator::new();
//! assert_eq!(ids.next_id().to_string(), "000001");
//!
//! let event = EventKind::from_label("ADT_A01 - Admit/visit Notification").unwrap();
//! assert_eq!(event, Some(EventKind::AdtA01));
//!
//! let config = SimulationConfig {
//!     time_multiplier: 60.0,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod enums;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use enums::*;
pub use identifiers::*;
