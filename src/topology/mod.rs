//! Simulation network description
//!
//! This module turns topology documents into a validated, immutable network of
//! states and transitions.
//!
//! # Overview
//!
//! - **TopologyDefinition**: unvalidated serde model of one simulation
//! - **ConfigurationFile**: a topology file holding one or more simulations
//! - **Topology**: the validated network the engine runs, built with
//!   [`Topology::build`]
//! - **TopologyError**: every reason a network is rejected before the run starts
//!
//! # Usage Example
//!
//! ```rust
//! use patient_flow_simulator::topology::*;
//!
//! let definition = TopologyDefinition::new("Clinic", "Waiting Room", "Checkout")
//!     .with_state("Waiting Room", 5)
//!     .with_state("Checkout", 2)
//!     .with_transition(TransitionDefinition::ingress("Waiting Room", 1.0, 2.0))
//!     .with_transition(TransitionDefinition::between("Waiting Room", "Checkout", 0.5, 1.0))
//!     .with_transition(TransitionDefinition::egress("Checkout", 1.0, 1.0));
//!
//! let topology = Topology::build(&definition).unwrap();
//! assert_eq!(topology.start_state().name, "Waiting Room");
//!
//! // Reachability is checked once, at build time
//! let broken = TopologyDefinition::new("Broken", "Waiting Room", "Checkout")
//!     .with_state("Waiting Room", 5)
//!     .with_state("Checkout", 2)
//!     .with_transition(TransitionDefinition::ingress("Waiting Room", 1.0, 2.0))
//!     .with_transition(TransitionDefinition::egress("Checkout", 1.0, 1.0));
//! assert!(matches!(Topology::build(&broken), Err(TopologyError::Unreachable { .. })));
//! ```

pub mod definition;
pub mod registry;

// Re-export all public types for convenience
pub use definition::*;
pub use registry::*;
