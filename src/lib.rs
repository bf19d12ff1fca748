//! Patient Flow Simulator
//!
//! A discrete-event simulation engine that moves entities through a network of
//! capacity-bounded states along probabilistic, periodically triggered
//! transitions, announcing each move with an HL7 v2 message and recording it
//! in an audit log.
//!
//! # Overview
//!
//! This library models a care pathway as a directed graph. Patients enter
//! through a single ingress transition, queue in FIFO order inside each state,
//! move when a transition fires and its target has room, and leave through
//! egress transitions. A run ends once every live patient has reached the end
//! state and the network has drained, or when an operator stops it.
//!
//! ## Key Features
//!
//! - **Validated Topologies**: Duplicate names, dangling references and
//!   unreachable end states are rejected before anything runs
//! - **Concurrent Triggers**: One periodic task per transition with per-state
//!   locking and deadlock-free lock ordering
//! - **Phased Termination**: `RUNNING`, `DRAINING` and `STOPPED` with a
//!   cooperative operator stop
//! - **Message Generation**: ADT, ORM and ORU messages built per firing
//! - **Audit Logging**: Append-only text or JSON Lines records of every
//!   outcome
//!
//! ## Quick Start
//!
//! ```rust
//! use patient_flow_simulator::*;
//!
//! let definition = TopologyDefinition::new("Emergency", "Triage", "Discharge")
//!     .with_state("Triage", 5)
//!     .with_state("Discharge", 10)
//!     .with_transition(TransitionDefinition::ingress("Triage", 0.8, 30.0))
//!     .with_transition(TransitionDefinition::between("Triage", "Discharge", 0.5, 10.0))
//!     .with_transition(TransitionDefinition::egress("Discharge", 1.0, 5.0));
//!
//! let topology = Topology::build(&definition)?;
//! let simulation = Simulation::new(topology, SimulationConfig::default(), Collaborators::default())?;
//!
//! println!("Simulation {} is {}", simulation.run_id(), simulation.status());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: Core types, identifiers, and configuration
//! - [`topology`]: Topology definitions, validation, and the read-only registry
//! - [`entity`]: Patients and their generation
//! - [`events`]: Audit records, audit sinks, and message generation
//! - [`simulation`]: Population store, executor, scheduler, and run control
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Types     │    │  Topology   │    │   Entity    │
//! │             │    │             │    │             │
//! │ Identifiers │◄───┤ Definition  │    │ Patient     │
//! │ Enums       │    │ Validation  │    │ Generator   │
//! │ Config      │    │ Registry    │    │             │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!        ▲                   ▲                   ▲
//!        │                   │                   │
//! ┌─────────────┐    ┌─────────────────────────────────┐
//! │   Events    │    │           Simulation            │
//! │             │    │                                 │
//! │ Audit Log   │◄───┤ Population  Executor  Scheduler │
//! │ HL7 Messages│    │ Monitor     Statistics          │
//! └─────────────┘    └─────────────────────────────────┘
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod entity;
pub mod events;
pub mod simulation;
pub mod topology;
pub mod types;

// Core types and identifiers
pub use types::{
    BlockReason,
    ConfigValidationError,
    // Identifiers
    EntityId,
    // Enums
    EventKind,
    IdGenerator,
    LogAction,
    LogFormat,
    RunId,
    RunStatus,
    // Configuration
    SimulationConfig,
    StateId,
};

// Topology types and functionality
pub use topology::{
    ConfigurationFile, State, Topology, TopologyDefinition, TopologyError, Transition,
    TransitionDefinition, TransitionKind,
};

// Entity types and functionality
pub use entity::{Entity, EntityFactory, PatientGenerator};

// Event types and functionality
pub use events::{
    AuditLog, AuditSink, FileSink, Hl7MessageGenerator, LogRecord, MemorySink, MessageError,
    MessageGenerator,
};

// Simulation types and functionality
pub use simulation::{
    ChannelObserver, Collaborators, FiringCounts, FiringOutcome, OccupancyObserver,
    OccupancySnapshot, PopulationStore, RuntimeStatistics, Simulation, SimulationError,
    SimulationReport, SimulationResult,
};
