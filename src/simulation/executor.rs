//! Transition execution
//!
//! The [`Executor`] performs one firing of one transition: it samples the
//! probability gate, then applies the population change under the state locks.
//! The audit position and timestamp are taken under those same locks; the
//! message is requested and the record written once the locks are released.
//! Records of one entity therefore stay in causal order however long the
//! message collaborator takes.

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::entity::{Entity, EntityFactory};
use crate::events::{AuditLog, LogRecord, MessageGenerator};
use crate::simulation::{
    OccupancyObserver, PopulationStore, RuntimeStatistics, SimClock, StatusCell, StoreOutcome,
};
use crate::topology::{Topology, Transition, TransitionKind};
use crate::types::{BlockReason, IdGenerator};

/// What a single firing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    /// The probability gate said no
    SkippedByProbability,
    /// The gate passed but the move was not feasible
    Blocked(BlockReason),
    /// The run phase no longer permits this transition
    Disabled,
    /// A new entity was admitted
    Entered,
    /// An entity moved between two states
    Moved,
    /// An entity left the network
    Removed,
}

impl FiringOutcome {
    /// Whether the firing changed the population
    pub fn is_success(&self) -> bool {
        matches!(self, FiringOutcome::Entered | FiringOutcome::Moved | FiringOutcome::Removed)
    }
}

/// Everything a firing reads or writes, shared by all trigger tasks
pub struct Executor {
    topology: Arc<Topology>,
    population: Arc<PopulationStore>,
    audit: Arc<AuditLog>,
    stats: Arc<RuntimeStatistics>,
    status: Arc<StatusCell>,
    activity: Arc<Notify>,
    clock: SimClock,
    ids: Arc<IdGenerator>,
    entities: Arc<dyn EntityFactory>,
    messages: Arc<dyn MessageGenerator>,
    observer: Option<Arc<dyn OccupancyObserver>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("simulation", &self.topology.name())
            .field("status", &self.status.get())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

/// Shared handles an [`Executor`] is built from
pub(crate) struct ExecutorParts {
    pub(crate) topology: Arc<Topology>,
    pub(crate) population: Arc<PopulationStore>,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) stats: Arc<RuntimeStatistics>,
    pub(crate) status: Arc<StatusCell>,
    pub(crate) activity: Arc<Notify>,
    pub(crate) clock: SimClock,
    pub(crate) ids: Arc<IdGenerator>,
    pub(crate) entities: Arc<dyn EntityFactory>,
    pub(crate) messages: Arc<dyn MessageGenerator>,
    pub(crate) observer: Option<Arc<dyn OccupancyObserver>>,
}

impl Executor {
    pub(crate) fn new(parts: ExecutorParts) -> Self {
        Self {
            topology: parts.topology,
            population: parts.population,
            audit: parts.audit,
            stats: parts.stats,
            status: parts.status,
            activity: parts.activity,
            clock: parts.clock,
            ids: parts.ids,
            entities: parts.entities,
            messages: parts.messages,
            observer: parts.observer,
        }
    }

    /// Topology the executor runs
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Fire `transition` once: probability gate, then [`execute`](Self::execute)
    ///
    /// One uniform sample is drawn per firing; the firing proceeds only when
    /// the sample is at most the transition's probability. A probability of
    /// zero never proceeds.
    pub fn fire<R: Rng + ?Sized>(&self, transition: &Transition, rng: &mut R) -> FiringOutcome {
        self.stats.record_attempt();

        let sample: f64 = rng.gen();
        if transition.probability <= 0.0 || sample > transition.probability {
            self.stats.record_skipped();
            trace!("{} skipped by probability gate", self.topology.describe(transition));
            return FiringOutcome::SkippedByProbability;
        }

        self.execute(transition)
    }

    /// Apply `transition` without the probability gate
    pub fn execute(&self, transition: &Transition) -> FiringOutcome {
        let egress = transition.is_egress();
        let permitted = || self.status.get().permits(egress);
        let stamp = || self.audit.reserve(|| self.clock.now());

        let result = match transition.kind {
            TransitionKind::Ingress { target } => self.population.admit_stamped(
                target,
                permitted,
                || self.entities.create(self.ids.next_id()),
                stamp,
            ),
            TransitionKind::Egress { source } => {
                self.population.release_stamped(source, permitted, stamp)
            }
            TransitionKind::Regular { source, target } => {
                self.population.transfer_stamped(source, target, permitted, stamp)
            }
        };

        let source = transition.source().map(|id| self.topology.state(id).name.as_str());
        let target = transition.target().map(|id| self.topology.state(id).name.as_str());

        let (entity, slot, timestamp) = match result {
            Ok((StoreOutcome::Applied(entity), (slot, timestamp))) => (entity, slot, timestamp),
            Ok((StoreOutcome::Refused, _)) => {
                self.stats.record_disabled();
                debug!("{} refused in phase {}", self.topology.describe(transition), self.status.get());
                return FiringOutcome::Disabled;
            }
            Ok((StoreOutcome::Blocked(reason), (slot, timestamp))) => {
                self.stats.record_blocked();
                trace!("{} blocked: {}", self.topology.describe(transition), reason);
                slot.fill(LogRecord::blocked(timestamp, source, target, reason));
                return FiringOutcome::Blocked(reason);
            }
            Err(e) => {
                self.stats.record_runtime_error();
                warn!("{} skipped: {}", self.topology.describe(transition), e);
                let (slot, timestamp) = self.audit.reserve(|| self.clock.now());
                slot.fill(
                    LogRecord::blocked(timestamp, source, target, BlockReason::MissingState)
                        .with_detail(e.to_string()),
                );
                return FiringOutcome::Blocked(BlockReason::MissingState);
            }
        };

        let (record, outcome) = match (source, target) {
            (None, Some(target)) => {
                self.stats.record_entered();
                (LogRecord::entered(timestamp, &entity, target), FiringOutcome::Entered)
            }
            (Some(source), None) => {
                self.stats.record_removed();
                (LogRecord::removed(timestamp, &entity, source), FiringOutcome::Removed)
            }
            (Some(source), Some(target)) => {
                self.stats.record_moved();
                (LogRecord::moved(timestamp, &entity, source, target), FiringOutcome::Moved)
            }
            // Detached transitions are rejected when the topology is built
            (None, None) => return FiringOutcome::Blocked(BlockReason::MissingState),
        };

        slot.fill(self.attach_message(record.with_event(transition.event), &entity));

        if let Some(observer) = &self.observer {
            observer.on_snapshot(&self.population.occupancy_view());
        }
        self.activity.notify_one();

        outcome
    }

    fn attach_message(&self, record: LogRecord, entity: &Entity) -> LogRecord {
        let Some(event) = record.event else {
            return record;
        };

        match self.messages.generate(entity, event, record.timestamp) {
            Ok(message) => record.with_message(message),
            Err(e) => {
                self.stats.record_message_failure();
                warn!("Message generation failed for {} ({}): {}", entity, event.code(), e);
                record.with_message(format!("Error generating HL7 message: {}", e))
            }
        }
    }
}
