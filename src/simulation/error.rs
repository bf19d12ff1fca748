//! Error types and handling
//!
//! This module contains the error types raised while building and running a
//! simulation.

use thiserror::Error;

use crate::topology::TopologyError;
use crate::types::ConfigValidationError;

/// Errors that can occur while building or running a simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The topology was rejected; the run never starts
    #[error("Invalid topology: {0}")]
    Configuration(#[from] TopologyError),

    /// Runtime configuration validation failed
    #[error("Configuration validation failed: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// Internal lookup failure while executing a transition
    #[error("Transition failed: {0}")]
    RuntimeTransition(String),

    /// The message collaborator failed
    #[error("Message generation failed: {0}")]
    MessageGeneration(String),

    /// The audit log sink failed
    #[error("Audit log sink failed: {0}")]
    LogSink(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A control operation was called in the wrong phase
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl SimulationError {
    /// Create a runtime transition error
    pub fn runtime_transition(msg: impl Into<String>) -> Self {
        Self::RuntimeTransition(msg.into())
    }

    /// Create a message generation error
    pub fn message_generation(msg: impl Into<String>) -> Self {
        Self::MessageGeneration(msg.into())
    }

    /// Create a log sink error
    pub fn log_sink(msg: impl Into<String>) -> Self {
        Self::LogSink(msg.into())
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Check if the run can continue after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            SimulationError::Configuration(_) => false,
            SimulationError::InvalidConfig(_) => false,
            SimulationError::RuntimeTransition(_) => true,
            SimulationError::MessageGeneration(_) => true,
            SimulationError::LogSink(_) => true,
            SimulationError::Io(_) => true,
            SimulationError::Serialization(_) => true,
            SimulationError::Lifecycle(_) => false,
        }
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            SimulationError::Configuration(_) => "Configuration",
            SimulationError::InvalidConfig(_) => "Configuration",
            SimulationError::RuntimeTransition(_) => "Runtime Transition",
            SimulationError::MessageGeneration(_) => "Message Generation",
            SimulationError::LogSink(_) => "Log Sink",
            SimulationError::Io(_) => "IO",
            SimulationError::Serialization(_) => "Serialization",
            SimulationError::Lifecycle(_) => "Lifecycle",
        }
    }
}

/// Result type for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;
