//! Entities flowing through the simulation
//!
//! # Overview
//!
//! - **Entity**: a patient with a stable identifier and display attributes
//! - **EntityFactory**: injectable source of new entities for ingress firings
//! - **PatientGenerator**: default factory with random demographics
//!
//! # Usage Example
//!
//! ```rust
//! use patient_flow_simulator::entity::*;
//! use patient_flow_simulator::types::*;
//!
//! let ids = IdGenerator::new();
//! let generator = PatientGenerator::with_seed(42);
//!
//! let patient = generator.create(ids.next_id());
//! assert_eq!(patient.id, EntityId(1));
//! ```

#[allow(clippy::module_inception)]
pub mod entity;
pub mod generator;

// Re-export all public types for convenience
pub use entity::Entity;
pub use generator::{EntityFactory, PatientGenerator};
