//! Simulation control surface
//!
//! [`Simulation`] ties a validated topology to its collaborators and exposes
//! `start`, `stop`, a status query and `wait` to whatever drives the run.

use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::entity::{EntityFactory, PatientGenerator};
use crate::events::{AuditLog, AuditSink, Hl7MessageGenerator, LogRecord, MemorySink, MessageGenerator};
use crate::simulation::{
    Executor, ExecutorParts, OccupancyObserver, PopulationStore, RuntimeStatistics, Scheduler,
    SimClock, SimulationError, SimulationReport, SimulationResult, StatusCell, StopReason,
    TerminationMonitor,
};
use crate::topology::{Topology, TopologyDefinition};
use crate::types::{IdGenerator, RunId, RunStatus, SimulationConfig};

/// External collaborators of a simulation
pub struct Collaborators {
    /// Builds the message announced by a firing
    pub messages: Arc<dyn MessageGenerator>,
    /// Creates entities on ingress
    pub entities: Arc<dyn EntityFactory>,
    /// Source of entity identifiers
    pub ids: Arc<IdGenerator>,
    /// Receives occupancy snapshots after successful firings
    pub observer: Option<Arc<dyn OccupancyObserver>>,
    /// Destination of audit records
    pub audit_sink: Box<dyn AuditSink>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("next_id", &self.ids.peek())
            .field("has_observer", &self.observer.is_some())
            .field("audit_location", &self.audit_sink.location())
            .finish()
    }
}

impl Collaborators {
    /// Default collaborators writing audit records to `sink`
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self {
            messages: Arc::new(Hl7MessageGenerator::new()),
            entities: Arc::new(PatientGenerator::new()),
            ids: Arc::new(IdGenerator::new()),
            observer: None,
            audit_sink: Box::new(sink),
        }
    }

    /// Default collaborators with entity generation seeded from `seed`
    pub fn seeded(sink: impl AuditSink + 'static, seed: Option<u64>) -> Self {
        Self::new(sink).with_entities(PatientGenerator::from_seed(seed))
    }

    /// Replace the message generator
    pub fn with_messages(mut self, messages: impl MessageGenerator + 'static) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    /// Replace the entity factory
    pub fn with_entities(mut self, entities: impl EntityFactory + 'static) -> Self {
        self.entities = Arc::new(entities);
        self
    }

    /// Replace the identifier generator
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Attach an occupancy observer
    pub fn with_observer(mut self, observer: impl OccupancyObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(MemorySink::new())
    }
}

/// Collaborators held until `start` hands them to the executor
struct Pending {
    messages: Arc<dyn MessageGenerator>,
    entities: Arc<dyn EntityFactory>,
    ids: Arc<IdGenerator>,
    observer: Option<Arc<dyn OccupancyObserver>>,
}

/// One simulation run over a validated topology
pub struct Simulation {
    run_id: RunId,
    topology: Arc<Topology>,
    config: SimulationConfig,
    population: Arc<PopulationStore>,
    audit: Arc<AuditLog>,
    stats: Arc<RuntimeStatistics>,
    status: Arc<StatusCell>,
    activity: Arc<Notify>,
    shutdown: CancellationToken,
    cancelled: Arc<AtomicBool>,
    clock: OnceLock<SimClock>,
    stop_reason: OnceLock<StopReason>,
    pending: Mutex<Option<Pending>>,
    monitor: Mutex<Option<JoinHandle<StopReason>>>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("run_id", &self.run_id)
            .field("simulation", &self.topology.name())
            .field("status", &self.status())
            .field("admitted", &self.population.admitted())
            .field("removed", &self.population.removed())
            .finish()
    }
}

impl Simulation {
    /// Create a simulation over an already validated topology
    #[instrument(skip_all, fields(simulation = %topology.name()))]
    pub fn new(
        topology: Topology,
        config: SimulationConfig,
        collaborators: Collaborators,
    ) -> SimulationResult<Self> {
        config.validate()?;

        let run_id = RunId::new();
        let population = Arc::new(PopulationStore::new(&topology));
        let audit = Arc::new(AuditLog::from_boxed(collaborators.audit_sink));

        info!(
            "Created simulation {} for '{}' ({} states, {} transitions)",
            run_id,
            topology.name(),
            topology.states().len(),
            topology.transitions().len()
        );

        Ok(Self {
            run_id,
            topology: Arc::new(topology),
            config,
            population,
            audit,
            stats: Arc::new(RuntimeStatistics::new()),
            status: Arc::new(StatusCell::new()),
            activity: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            clock: OnceLock::new(),
            stop_reason: OnceLock::new(),
            pending: Mutex::new(Some(Pending {
                messages: collaborators.messages,
                entities: collaborators.entities,
                ids: collaborators.ids,
                observer: collaborators.observer,
            })),
            monitor: Mutex::new(None),
        })
    }

    /// Validate `definition` and create a simulation over it
    pub fn from_definition(
        definition: &TopologyDefinition,
        config: SimulationConfig,
        collaborators: Collaborators,
    ) -> SimulationResult<Self> {
        let topology = Topology::build(definition)?;
        Self::new(topology, config, collaborators)
    }

    /// Start every trigger and the termination monitor
    ///
    /// Must be called from within a tokio runtime. With `admit_on_start` the
    /// ingress transition is applied once immediately, bypassing its
    /// probability gate.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub fn start(&self) -> SimulationResult<()> {
        tokio::runtime::Handle::try_current()
            .map_err(|_| SimulationError::lifecycle("start() must be called inside a tokio runtime"))?;

        let pending = self.pending.lock().take().ok_or_else(|| {
            SimulationError::lifecycle(format!("simulation is already {}", self.status()))
        })?;

        let origin = self.config.simulated_start.unwrap_or_else(Utc::now);
        let clock = self.clock.get_or_init(|| SimClock::new(origin, self.config.time_multiplier)).clone();

        let executor = Arc::new(Executor::new(ExecutorParts {
            topology: self.topology.clone(),
            population: self.population.clone(),
            audit: self.audit.clone(),
            stats: self.stats.clone(),
            status: self.status.clone(),
            activity: self.activity.clone(),
            clock: clock.clone(),
            ids: pending.ids,
            entities: pending.entities,
            messages: pending.messages,
            observer: pending.observer,
        }));

        self.status.set(RunStatus::Running);
        info!("Simulation '{}' running at {}x", self.topology.name(), self.config.time_multiplier);

        if self.config.admit_on_start {
            if let Some(ingress) = self.topology.ingress() {
                let outcome = executor.execute(ingress);
                debug!("Initial admission: {:?}", outcome);
            }
        }

        let scheduler =
            Scheduler::spawn(executor, self.status.clone(), &self.config, self.shutdown.clone());

        let monitor = TerminationMonitor {
            population: self.population.clone(),
            audit: self.audit.clone(),
            status: self.status.clone(),
            activity: self.activity.clone(),
            shutdown: self.shutdown.clone(),
            cancelled: self.cancelled.clone(),
            clock,
            end_state: self.topology.end_state().id,
            poll_interval: self.config.monitor_interval(),
        };
        *self.monitor.lock() = Some(tokio::spawn(monitor.run(scheduler)));

        Ok(())
    }

    /// Request cooperative cancellation
    ///
    /// No new firing starts after this call; a firing already in progress
    /// completes. The run then records a final `cancelled` entry and stops.
    /// Stopping a run that never started stops it for good.
    pub fn stop(&self) {
        match self.status() {
            RunStatus::Stopped => debug!("Stop requested on a stopped simulation"),
            RunStatus::Idle => {
                if self.pending.lock().take().is_some() {
                    self.cancelled.store(true, Ordering::Release);
                    self.audit.append(LogRecord::cancelled(
                        self.config.simulated_start.unwrap_or_else(Utc::now),
                    ));
                    self.status.set(RunStatus::Stopped);
                    self.audit.finalize();
                    info!("Simulation stopped before it started");
                } else {
                    // start() is in progress; its triggers and monitor see the cancellation
                    self.cancelled.store(true, Ordering::Release);
                    self.shutdown.cancel();
                }
            }
            RunStatus::Running | RunStatus::Draining => {
                info!("Stop requested for simulation {}", self.run_id);
                self.cancelled.store(true, Ordering::Release);
                self.shutdown.cancel();
            }
        }
    }

    /// Current run phase
    pub fn status(&self) -> RunStatus {
        self.status.get()
    }

    /// Receiver notified on every phase change
    pub fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Wait for the run to stop and return its report
    pub async fn wait(&self) -> SimulationResult<SimulationReport> {
        let handle = self.monitor.lock().take();

        match handle {
            Some(handle) => {
                let reason = handle
                    .await
                    .map_err(|e| SimulationError::lifecycle(format!("monitor task failed: {}", e)))?;
                debug!("Monitor finished: {:?}", reason);
                let _ = self.stop_reason.set(reason);
            }
            None if self.status() == RunStatus::Stopped => {}
            None => {
                return Err(SimulationError::lifecycle(format!(
                    "cannot wait on a simulation that is {} and not being waited on",
                    self.status()
                )));
            }
        }

        Ok(self.report())
    }

    /// Stop the run and wait for it to finish
    pub async fn cancel(&self) -> SimulationResult<SimulationReport> {
        self.stop();
        self.wait().await
    }

    /// Report of the run so far
    pub fn report(&self) -> SimulationReport {
        let locked = self.population.lock_all();
        let final_occupancy = locked.snapshot();
        let (admitted, removed, remaining) =
            (locked.admitted(), locked.removed(), locked.total() as u64);
        drop(locked);

        let (simulated_end, wall_seconds) = match self.clock.get() {
            Some(clock) => (clock.now(), clock.wall_elapsed().as_secs_f64()),
            None => (self.config.simulated_start.unwrap_or_else(Utc::now), 0.0),
        };

        if self.audit.has_failed() {
            warn!("Audit log for {} is incomplete", self.run_id);
        }

        SimulationReport {
            run_id: self.run_id,
            simulation_name: self.topology.name().to_string(),
            status: self.status(),
            cancelled: match self.stop_reason.get() {
                Some(reason) => *reason == StopReason::Cancelled,
                None => self.cancelled.load(Ordering::Acquire),
            },
            admitted,
            removed,
            remaining,
            firings: self.stats.counts(),
            final_occupancy,
            wall_seconds,
            simulated_end,
            audit_records: self.audit.appended(),
            audit_log: self.audit.location().map(|p| p.to_path_buf()),
            audit_sink_failed: self.audit.has_failed(),
        }
    }

    /// Unique identifier of this run
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Topology being simulated
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Runtime configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Live population
    pub fn population(&self) -> &PopulationStore {
        &self.population
    }

    /// Audit log of the run
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Firing counters
    pub fn statistics(&self) -> &RuntimeStatistics {
        &self.stats
    }
}
