//! Validated, immutable topology
//!
//! [`Topology::build`] is the only way to obtain a [`Topology`]; every check
//! that can reject a run happens here, before any scheduler exists.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, instrument, warn};

use super::definition::{StateRef, TopologyDefinition};
use crate::types::{EventKind, StateId};

/// Display name used for the outside world on the ingress side
pub const ENTRY_NAME: &str = "Simulation Entry";

/// Display name used for the outside world on the egress side
pub const EXIT_NAME: &str = "Simulation Exit";

/// Reasons a topology is rejected before the run starts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    /// A state has an empty name
    #[error("State #{0} has an empty name")]
    EmptyStateName(usize),

    /// Two states share a name
    #[error("Duplicate state name: {0}")]
    DuplicateState(String),

    /// A state has a negative capacity
    #[error("State '{name}' has negative capacity {capacity}")]
    NegativeCapacity {
        /// State name
        name: String,
        /// Configured capacity
        capacity: i64,
    },

    /// The start state is not one of the topology's states
    #[error("Start state '{0}' is not defined")]
    UnknownStartState(String),

    /// The end state is not one of the topology's states
    #[error("End state '{0}' is not defined")]
    UnknownEndState(String),

    /// A transition references a state that does not exist
    #[error("Transition #{transition} references unknown state '{state}'")]
    UnknownState {
        /// Transition index
        transition: usize,
        /// Referenced name
        state: String,
    },

    /// A transition has neither source nor target
    #[error("Transition #{0} has neither source nor target")]
    DetachedTransition(usize),

    /// A transition leads from a state back to itself
    #[error("Transition #{transition} loops on state '{state}'")]
    SelfLoop {
        /// Transition index
        transition: usize,
        /// State name
        state: String,
    },

    /// Probability outside [0, 1]
    #[error("Transition #{transition} has probability {value} (must be between 0.0 and 1.0)")]
    InvalidProbability {
        /// Transition index
        transition: usize,
        /// Configured probability
        value: f64,
    },

    /// Frequency not a positive finite number
    #[error("Transition #{transition} has frequency {value} (must be greater than 0)")]
    InvalidFrequency {
        /// Transition index
        transition: usize,
        /// Configured frequency
        value: f64,
    },

    /// Event tag is not in the catalogue
    #[error("Transition #{transition} has unknown event '{label}'")]
    UnknownEvent {
        /// Transition index
        transition: usize,
        /// Event label as written
        label: String,
    },

    /// No transition admits entities
    #[error("Topology has no ingress transition")]
    NoIngress,

    /// More than one transition admits entities
    #[error("Topology has {0} ingress transitions (exactly one is required)")]
    MultipleIngress(usize),

    /// No transition lets entities leave
    #[error("Topology has no egress transition")]
    NoEgress,

    /// The end state cannot be reached from the start state
    #[error("No path of transitions leads from start state '{start}' to end state '{end}'")]
    Unreachable {
        /// Start state name
        start: String,
        /// End state name
        end: String,
    },
}

/// A capacity-bounded holding location
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Index of the state
    pub id: StateId,
    /// Unique name
    pub name: String,
    /// Maximum number of simultaneous occupants
    pub capacity: usize,
    /// Position in the global lock order (lexicographic by name)
    pub lock_rank: usize,
}

/// Shape of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Admits new entities into `target`
    Ingress {
        /// Receiving state
        target: StateId,
    },
    /// Releases entities from `source`
    Egress {
        /// Releasing state
        source: StateId,
    },
    /// Moves entities from `source` to `target`
    Regular {
        /// Releasing state
        source: StateId,
        /// Receiving state
        target: StateId,
    },
}

/// A timed, probabilistic rule moving at most one entity per firing
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Position of the transition in the topology
    pub index: usize,
    /// Ingress, egress or regular
    pub kind: TransitionKind,
    /// Chance that a scheduled firing proceeds
    pub probability: f64,
    /// Scheduled firing attempts per simulated time unit
    pub frequency: f64,
    /// Event announced when the transition moves an entity
    pub event: Option<EventKind>,
}

impl Transition {
    /// Whether this transition admits new entities
    pub fn is_ingress(&self) -> bool {
        matches!(self.kind, TransitionKind::Ingress { .. })
    }

    /// Whether this transition releases entities
    pub fn is_egress(&self) -> bool {
        matches!(self.kind, TransitionKind::Egress { .. })
    }

    /// Source state, `None` for ingress
    pub fn source(&self) -> Option<StateId> {
        match self.kind {
            TransitionKind::Ingress { .. } => None,
            TransitionKind::Egress { source } | TransitionKind::Regular { source, .. } => {
                Some(source)
            }
        }
    }

    /// Target state, `None` for egress
    pub fn target(&self) -> Option<StateId> {
        match self.kind {
            TransitionKind::Egress { .. } => None,
            TransitionKind::Ingress { target } | TransitionKind::Regular { target, .. } => {
                Some(target)
            }
        }
    }
}

/// Immutable, validated description of a simulation network
#[derive(Debug, Clone)]
pub struct Topology {
    name: String,
    states: Vec<State>,
    transitions: Vec<Transition>,
    start: StateId,
    end: StateId,
    by_name: HashMap<String, StateId>,
}

impl Topology {
    /// Validate a definition and build the topology from it
    #[instrument(skip(definition), fields(simulation = %definition.name))]
    pub fn build(definition: &TopologyDefinition) -> Result<Self, TopologyError> {
        let mut by_name = HashMap::with_capacity(definition.states.len());
        let mut states = Vec::with_capacity(definition.states.len());

        for (index, state) in definition.states.iter().enumerate() {
            if state.name.trim().is_empty() {
                return Err(TopologyError::EmptyStateName(index));
            }
            if state.max_capacity < 0 {
                return Err(TopologyError::NegativeCapacity {
                    name: state.name.clone(),
                    capacity: state.max_capacity,
                });
            }
            if by_name.insert(state.name.clone(), StateId(index)).is_some() {
                return Err(TopologyError::DuplicateState(state.name.clone()));
            }
            states.push(State {
                id: StateId(index),
                name: state.name.clone(),
                capacity: state.max_capacity as usize,
                lock_rank: 0,
            });
        }

        // Global lock order: lexicographic by state name
        let mut ordered: Vec<usize> = (0..states.len()).collect();
        ordered.sort_by(|a, b| states[*a].name.cmp(&states[*b].name));
        for (rank, index) in ordered.into_iter().enumerate() {
            states[index].lock_rank = rank;
        }

        let start = by_name
            .get(definition.start_state.name())
            .copied()
            .ok_or_else(|| TopologyError::UnknownStartState(definition.start_state.name().to_string()))?;
        let end = by_name
            .get(definition.end_state.name())
            .copied()
            .ok_or_else(|| TopologyError::UnknownEndState(definition.end_state.name().to_string()))?;

        let resolve = |transition: usize, reference: &Option<StateRef>| -> Result<Option<StateId>, TopologyError> {
            match reference {
                None => Ok(None),
                Some(reference) => by_name.get(reference.name()).copied().map(Some).ok_or_else(|| {
                    TopologyError::UnknownState { transition, state: reference.name().to_string() }
                }),
            }
        };

        let mut transitions = Vec::with_capacity(definition.transitions.len());
        for (index, transition) in definition.transitions.iter().enumerate() {
            let source = resolve(index, &transition.source)?;
            let target = resolve(index, &transition.target)?;

            let kind = match (source, target) {
                (None, None) => return Err(TopologyError::DetachedTransition(index)),
                (None, Some(target)) => TransitionKind::Ingress { target },
                (Some(source), None) => TransitionKind::Egress { source },
                (Some(source), Some(target)) if source == target => {
                    return Err(TopologyError::SelfLoop {
                        transition: index,
                        state: states[source.index()].name.clone(),
                    });
                }
                (Some(source), Some(target)) => TransitionKind::Regular { source, target },
            };

            if !(0.0..=1.0).contains(&transition.probability) {
                return Err(TopologyError::InvalidProbability {
                    transition: index,
                    value: transition.probability,
                });
            }
            if !transition.frequency.is_finite() || transition.frequency <= 0.0 {
                return Err(TopologyError::InvalidFrequency {
                    transition: index,
                    value: transition.frequency,
                });
            }

            let event = match &transition.event {
                None => None,
                Some(reference) => EventKind::from_label(reference.label()).map_err(|_| {
                    TopologyError::UnknownEvent {
                        transition: index,
                        label: reference.label().to_string(),
                    }
                })?,
            };

            transitions.push(Transition {
                index,
                kind,
                probability: transition.probability,
                frequency: transition.frequency,
                event,
            });
        }

        let ingress_count = transitions.iter().filter(|t| t.is_ingress()).count();
        match ingress_count {
            0 => return Err(TopologyError::NoIngress),
            1 => {}
            n => return Err(TopologyError::MultipleIngress(n)),
        }
        if !transitions.iter().any(|t| t.is_egress()) {
            return Err(TopologyError::NoEgress);
        }

        let topology = Self {
            name: definition.name.clone(),
            states,
            transitions,
            start,
            end,
            by_name,
        };

        if !topology.has_forward_path() {
            return Err(TopologyError::Unreachable {
                start: topology.state(start).name.clone(),
                end: topology.state(end).name.clone(),
            });
        }

        topology.warn_about_suspicious_shape();

        info!(
            "Topology '{}' validated: {} states, {} transitions",
            topology.name,
            topology.states.len(),
            topology.transitions.len()
        );
        Ok(topology)
    }

    /// Whether a chain of regular transitions leads from start to end
    ///
    /// Breadth-first search never revisits a state, so any path it finds
    /// is one without repeated states.
    fn has_forward_path(&self) -> bool {
        if self.start == self.end {
            return true;
        }

        let mut visited = HashSet::from([self.start]);
        let mut queue = VecDeque::from([self.start]);

        while let Some(current) = queue.pop_front() {
            for transition in &self.transitions {
                if let TransitionKind::Regular { source, target } = transition.kind {
                    if source != current || !visited.insert(target) {
                        continue;
                    }
                    if target == self.end {
                        debug!("Found forward path to '{}'", self.state(target).name);
                        return true;
                    }
                    queue.push_back(target);
                }
            }
        }

        false
    }

    fn warn_about_suspicious_shape(&self) {
        if let Some(ingress) = self.ingress() {
            if ingress.target() != Some(self.start) {
                warn!(
                    "Ingress transition admits into '{}' instead of start state '{}'",
                    self.target_name(ingress),
                    self.state(self.start).name
                );
            }
        }

        let end_has_egress = self
            .transitions
            .iter()
            .any(|t| t.is_egress() && t.source() == Some(self.end));
        if !end_has_egress {
            warn!(
                "No egress transition leaves end state '{}'; the drain phase may never finish",
                self.state(self.end).name
            );
        }
    }

    /// Simulation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All states, indexed by [`StateId`]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// All transitions in definition order
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// State with the given id
    ///
    /// Ids handed out by this topology are always in range.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    /// Look up a state by name
    pub fn state_by_name(&self, name: &str) -> Option<&State> {
        self.by_name.get(name).map(|id| self.state(*id))
    }

    /// Name of the state a transition leaves, [`ENTRY_NAME`] for ingress
    pub fn source_name(&self, transition: &Transition) -> &str {
        transition.source().map_or(ENTRY_NAME, |id| self.state(id).name.as_str())
    }

    /// Name of the state a transition enters, [`EXIT_NAME`] for egress
    pub fn target_name(&self, transition: &Transition) -> &str {
        transition.target().map_or(EXIT_NAME, |id| self.state(id).name.as_str())
    }

    /// Designated start state
    pub fn start_state(&self) -> &State {
        self.state(self.start)
    }

    /// Designated end state
    pub fn end_state(&self) -> &State {
        self.state(self.end)
    }

    /// The single ingress transition
    pub fn ingress(&self) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.is_ingress())
    }

    /// All egress transitions
    pub fn egress_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(|t| t.is_egress())
    }

    /// Label such as `Triage -> Ward` for diagnostics and audit records
    pub fn describe(&self, transition: &Transition) -> String {
        let (source, target) = (self.source_name(transition), self.target_name(transition));
        format!("{} -> {}", source, target)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation: {}", self.name)?;
        writeln!(f, "States:")?;
        for state in &self.states {
            writeln!(f, "  {} (Max Capacity: {})", state.name, state.capacity)?;
        }
        writeln!(f, "Start State: {}", self.start_state().name)?;
        writeln!(f, "End State: {}", self.end_state().name)?;
        writeln!(f, "Transitions:")?;
        for transition in &self.transitions {
            write!(
                f,
                "  {} (probability {:.2}, frequency {})",
                self.describe(transition),
                transition.probability,
                transition.frequency
            )?;
            if let Some(event) = transition.event {
                write!(f, " [{}]", event.code())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TransitionDefinition;

    fn linear() -> TopologyDefinition {
        TopologyDefinition::new("Clinic", "Triage", "Discharge")
            .with_state("Triage", 3)
            .with_state("Ward", 5)
            .with_state("Discharge", 10)
            .with_transition(TransitionDefinition::ingress("Triage", 1.0, 2.0))
            .with_transition(TransitionDefinition::between("Triage", "Ward", 0.5, 1.0))
            .with_transition(TransitionDefinition::between("Ward", "Discharge", 0.5, 1.0))
            .with_transition(TransitionDefinition::egress("Discharge", 1.0, 1.0))
    }

    #[test]
    fn test_build_linear_topology() {
        let topology = Topology::build(&linear()).unwrap();
        assert_eq!(topology.name(), "Clinic");
        assert_eq!(topology.states().len(), 3);
        assert_eq!(topology.start_state().name, "Triage");
        assert_eq!(topology.end_state().name, "Discharge");
        assert!(topology.ingress().unwrap().is_ingress());
        assert_eq!(topology.egress_transitions().count(), 1);
        assert_eq!(topology.state_by_name("Ward").unwrap().capacity, 5);
    }

    #[test]
    fn test_lock_rank_is_lexicographic() {
        let topology = Topology::build(&linear()).unwrap();
        let rank = |name: &str| topology.state_by_name(name).unwrap().lock_rank;
        assert_eq!(rank("Discharge"), 0);
        assert_eq!(rank("Triage"), 1);
        assert_eq!(rank("Ward"), 2);
    }

    #[test]
    fn test_unreachable_end_rejected() {
        let definition = TopologyDefinition::new("Broken", "A", "C")
            .with_state("A", 1)
            .with_state("B", 1)
            .with_state("C", 1)
            .with_transition(TransitionDefinition::ingress("A", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("A", "B", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("C", "B", 1.0, 1.0))
            .with_transition(TransitionDefinition::egress("C", 1.0, 1.0));

        assert_eq!(
            Topology::build(&definition).unwrap_err(),
            TopologyError::Unreachable { start: "A".to_string(), end: "C".to_string() }
        );
    }

    #[test]
    fn test_path_through_cycle_is_found() {
        let definition = TopologyDefinition::new("Loop", "A", "D")
            .with_state("A", 1)
            .with_state("B", 1)
            .with_state("C", 1)
            .with_state("D", 1)
            .with_transition(TransitionDefinition::ingress("A", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("A", "B", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("B", "A", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("B", "C", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("C", "D", 1.0, 1.0))
            .with_transition(TransitionDefinition::egress("D", 1.0, 1.0));

        assert!(Topology::build(&definition).is_ok());
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let definition = linear().with_transition(TransitionDefinition::between("Ward", "ICU", 1.0, 1.0));
        assert_eq!(
            Topology::build(&definition).unwrap_err(),
            TopologyError::UnknownState { transition: 4, state: "ICU".to_string() }
        );
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let mut definition = linear();
        definition.states[1].max_capacity = -1;
        assert!(matches!(
            Topology::build(&definition),
            Err(TopologyError::NegativeCapacity { capacity: -1, .. })
        ));
    }

    #[test]
    fn test_ingress_count_enforced() {
        let mut definition = linear();
        definition.transitions.remove(0);
        assert_eq!(Topology::build(&definition).unwrap_err(), TopologyError::NoIngress);

        let definition = linear().with_transition(TransitionDefinition::ingress("Ward", 1.0, 1.0));
        assert_eq!(Topology::build(&definition).unwrap_err(), TopologyError::MultipleIngress(2));
    }

    #[test]
    fn test_egress_required() {
        let mut definition = linear();
        definition.transitions.pop();
        assert_eq!(Topology::build(&definition).unwrap_err(), TopologyError::NoEgress);
    }

    #[test]
    fn test_probability_and_frequency_bounds() {
        let mut definition = linear();
        definition.transitions[1].probability = 1.5;
        assert!(matches!(
            Topology::build(&definition),
            Err(TopologyError::InvalidProbability { transition: 1, .. })
        ));

        let mut definition = linear();
        definition.transitions[2].frequency = 0.0;
        assert!(matches!(
            Topology::build(&definition),
            Err(TopologyError::InvalidFrequency { transition: 2, .. })
        ));
    }

    #[test]
    fn test_self_loop_and_duplicates_rejected() {
        let definition = linear().with_transition(TransitionDefinition::between("Ward", "Ward", 1.0, 1.0));
        assert!(matches!(Topology::build(&definition), Err(TopologyError::SelfLoop { .. })));

        let definition = linear().with_state("Ward", 2);
        assert_eq!(
            Topology::build(&definition).unwrap_err(),
            TopologyError::DuplicateState("Ward".to_string())
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let mut definition = linear();
        definition.transitions[1].event =
            Some(crate::topology::EventRef::Label("XYZ_123 - Unknown".to_string()));
        assert!(matches!(
            Topology::build(&definition),
            Err(TopologyError::UnknownEvent { transition: 1, .. })
        ));
    }

    #[test]
    fn test_describe_uses_entry_and_exit_names() {
        let topology = Topology::build(&linear()).unwrap();
        let transitions = topology.transitions();
        assert_eq!(topology.describe(&transitions[0]), "Simulation Entry -> Triage");
        assert_eq!(topology.describe(&transitions[1]), "Triage -> Ward");
        assert_eq!(topology.describe(&transitions[3]), "Discharge -> Simulation Exit");

        assert_eq!(topology.source_name(&transitions[0]), ENTRY_NAME);
        assert_eq!(topology.target_name(&transitions[0]), "Triage");
        assert_eq!(topology.source_name(&transitions[3]), "Discharge");
        assert_eq!(topology.target_name(&transitions[3]), EXIT_NAME);
    }
}
