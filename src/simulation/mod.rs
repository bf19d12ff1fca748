//! Simulation runtime and control
//!
//! This module contains the population store, the transition executor, the
//! trigger scheduler, the termination monitor, statistics collection, and
//! error handling.
//!
//! # Overview
//!
//! - **Simulation**: Control surface with `start`, `stop`, `status` and `wait`
//! - **PopulationStore**: Per-state FIFO queues guarded by per-state locks
//! - **Executor**: Applies one firing of one transition and records it
//! - **Scheduler**: One periodic trigger task per transition
//! - **SimClock**: Simulated time derived from elapsed wall time
//! - **SimulationReport**: Counters and final occupancy of a finished run
//! - **SimulationError**: Error handling for simulation operations
//!
//! # Usage Example
//!
//! ```rust
//! use patient_flow_simulator::simulation::*;
//! use patient_flow_simulator::topology::*;
//! use patient_flow_simulator::types::*;
//!
//! let definition = TopologyDefinition::new("Clinic", "Waiting Room", "Waiting Room")
//!     .with_state("Waiting Room", 5)
//!     .with_transition(TransitionDefinition::ingress("Waiting Room", 1.0, 1.0))
//!     .with_transition(TransitionDefinition::egress("Waiting Room", 1.0, 1.0));
//!
//! let simulation = Simulation::from_definition(
//!     &definition,
//!     SimulationConfig::default(),
//!     Collaborators::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(simulation.status(), RunStatus::Idle);
//! assert_eq!(simulation.population().admitted(), 0);
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
mod monitor;
pub mod observer;
pub mod population;
pub mod scheduler;
pub mod statistics;

// Re-export all public types for convenience
pub use clock::*;
pub use engine::*;
pub use error::*;
pub use executor::{Executor, FiringOutcome};
pub use logging::*;
pub use observer::*;
pub use population::*;
pub use scheduler::*;
pub use statistics::*;

pub(crate) use executor::ExecutorParts;
pub(crate) use monitor::{StatusCell, StopReason, TerminationMonitor};
