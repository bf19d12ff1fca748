//! Topology input model and file loading
//!
//! These types mirror the JSON documents produced by the interactive
//! configuration builder. They are unvalidated: turn one into a
//! [`Topology`](super::Topology) with [`Topology::build`](super::Topology::build)
//! before running it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{ConfigError, EventKind};

/// A state as written in a topology document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDefinition {
    /// Unique state name
    pub name: String,
    /// Maximum number of simultaneous occupants
    #[serde(alias = "capacity")]
    pub max_capacity: i64,
    /// Display identifier assigned by the builder, not used by the engine
    #[serde(rename = "stateID", default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<i64>,
}

impl StateDefinition {
    /// Create a state definition
    pub fn new(name: impl Into<String>, max_capacity: i64) -> Self {
        Self { name: name.into(), max_capacity, state_id: None }
    }
}

/// Reference to a state, either by name or by an embedded state object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateRef {
    /// Plain state name
    Name(String),
    /// Embedded copy of the state definition
    Inline(StateDefinition),
}

impl StateRef {
    /// Name of the referenced state
    pub fn name(&self) -> &str {
        match self {
            StateRef::Name(name) => name,
            StateRef::Inline(state) => &state.name,
        }
    }
}

impl From<&str> for StateRef {
    fn from(name: &str) -> Self {
        StateRef::Name(name.to_string())
    }
}

/// Reference to a message event, either by label or by an event object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventRef {
    /// Label such as `"ADT_A01 - Admit/visit Notification"`
    Label(String),
    /// Event object as written by the builder
    Inline {
        /// Event label
        #[serde(rename = "eventName")]
        event_name: String,
        /// Catalogue number, not used by the engine
        #[serde(rename = "eventID", default)]
        event_id: Option<i64>,
    },
}

impl EventRef {
    /// Label of the referenced event
    pub fn label(&self) -> &str {
        match self {
            EventRef::Label(label) => label,
            EventRef::Inline { event_name, .. } => event_name,
        }
    }
}

/// A transition as written in a topology document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    /// Source state, absent for the ingress transition
    #[serde(default)]
    pub source: Option<StateRef>,
    /// Target state, absent for egress transitions
    #[serde(default)]
    pub target: Option<StateRef>,
    /// Event announced when the transition moves an entity
    #[serde(default)]
    pub event: Option<EventRef>,
    /// Chance that a scheduled firing proceeds
    pub probability: f64,
    /// Scheduled firing attempts per simulated time unit
    pub frequency: f64,
}

impl TransitionDefinition {
    /// Create a transition between two optional states
    pub fn new(source: Option<&str>, target: Option<&str>, probability: f64, frequency: f64) -> Self {
        Self {
            source: source.map(StateRef::from),
            target: target.map(StateRef::from),
            event: None,
            probability,
            frequency,
        }
    }

    /// Create the ingress transition into `target`
    pub fn ingress(target: &str, probability: f64, frequency: f64) -> Self {
        Self::new(None, Some(target), probability, frequency)
    }

    /// Create an egress transition out of `source`
    pub fn egress(source: &str, probability: f64, frequency: f64) -> Self {
        Self::new(Some(source), None, probability, frequency)
    }

    /// Create a regular transition from `source` to `target`
    pub fn between(source: &str, target: &str, probability: f64, frequency: f64) -> Self {
        Self::new(Some(source), Some(target), probability, frequency)
    }

    /// Attach a message event
    pub fn with_event(mut self, event: EventKind) -> Self {
        self.event = Some(EventRef::Label(event.code().to_string()));
        self
    }
}

/// One simulation as written in a topology document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDefinition {
    /// Simulation name, also used for the audit log location
    pub name: String,
    /// States of the network
    pub states: Vec<StateDefinition>,
    /// Transitions between states
    pub transitions: Vec<TransitionDefinition>,
    /// Event labels offered by the builder, informational only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    /// State new entities are expected to enter
    pub start_state: StateRef,
    /// State every entity must reach before the run drains
    pub end_state: StateRef,
}

impl TopologyDefinition {
    /// Create an empty definition with the given start and end states
    pub fn new(name: impl Into<String>, start_state: &str, end_state: &str) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            events: Vec::new(),
            start_state: StateRef::from(start_state),
            end_state: StateRef::from(end_state),
        }
    }

    /// Add a state
    pub fn with_state(mut self, name: &str, max_capacity: i64) -> Self {
        self.states.push(StateDefinition::new(name, max_capacity));
        self
    }

    /// Add a transition
    pub fn with_transition(mut self, transition: TransitionDefinition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Parse a single definition from JSON
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize the definition as pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A document holding several simulations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFile {
    /// Simulations in the order they were saved
    pub simulations: Vec<TopologyDefinition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TopologyDocument {
    Many(ConfigurationFile),
    Single(TopologyDefinition),
}

impl ConfigurationFile {
    /// Load a topology file holding one simulation or a `simulations` list
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {}
            Some(ext) => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => return Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }

        let content = fs::read_to_string(path)?;
        let file = Self::from_json(&content)?;
        info!("Loaded {} simulation(s) from {}", file.simulations.len(), path.display());
        Ok(file)
    }

    /// Parse a topology document from JSON
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let document: TopologyDocument = match serde_json::from_str(content) {
            Ok(document) => document,
            // Re-parse as a single simulation so the caller sees a precise error
            Err(_) => TopologyDocument::Single(serde_json::from_str(content)?),
        };

        Ok(match document {
            TopologyDocument::Many(file) => file,
            TopologyDocument::Single(definition) => Self { simulations: vec![definition] },
        })
    }

    /// Names of all simulations in the file
    pub fn simulation_names(&self) -> Vec<&str> {
        self.simulations.iter().map(|s| s.name.as_str()).collect()
    }

    /// Pick a simulation by name, or the first one when `name` is `None`
    pub fn select(&self, name: Option<&str>) -> Result<&TopologyDefinition, ConfigError> {
        let selected = match name {
            Some(name) => self.simulations.iter().find(|s| s.name == name),
            None => self.simulations.first(),
        };

        let selected = selected.ok_or_else(|| {
            ConfigError::SimulationNotFound(name.unwrap_or("<first>").to_string())
        })?;
        debug!("Selected simulation '{}'", selected.name);
        Ok(selected)
    }
}
