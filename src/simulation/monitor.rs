//! Termination monitor
//!
//! The monitor drives the run phases: `RUNNING` until every live entity sits
//! in the end state, `DRAINING` while egress transitions empty the network,
//! then `STOPPED`. An operator stop jumps straight to `STOPPED` from any phase.
//!
//! Phase changes are decided while every state lock is held, and executors
//! read the phase under the locks of the states they touch. Once the monitor
//! switches to `DRAINING`, no non-egress firing can change the population.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::events::{AuditLog, LogRecord};
use crate::simulation::{PopulationStore, Scheduler, SimClock};
use crate::types::{RunStatus, StateId};

/// Current run phase, readable from any thread and observable through `watch`
#[derive(Debug)]
pub(crate) struct StatusCell {
    sender: watch::Sender<RunStatus>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(RunStatus::Idle);
        Self { sender }
    }

    pub(crate) fn get(&self) -> RunStatus {
        *self.sender.borrow()
    }

    pub(crate) fn set(&self, status: RunStatus) {
        let previous = self.sender.send_replace(status);
        if previous != status {
            debug!("Run status {} -> {}", previous, status);
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.sender.subscribe()
    }
}

/// Why the monitor stopped the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// Every entity left the network after draining
    Drained,
    /// An operator requested a stop
    Cancelled,
}

/// Watches the population and moves the run through its phases
pub(crate) struct TerminationMonitor {
    pub(crate) population: Arc<PopulationStore>,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) status: Arc<StatusCell>,
    pub(crate) activity: Arc<Notify>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) cancelled: Arc<AtomicBool>,
    pub(crate) clock: SimClock,
    pub(crate) end_state: StateId,
    pub(crate) poll_interval: Duration,
}

impl TerminationMonitor {
    /// Run until drained or cancelled, then shut the scheduler down
    #[instrument(skip_all)]
    pub(crate) async fn run(self, scheduler: Scheduler) -> StopReason {
        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reason = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break StopReason::Cancelled,
                _ = self.activity.notified() => {}
                _ = poll.tick() => {}
            }

            if self.evaluate() {
                break StopReason::Drained;
            }
        };

        // Let in-flight firings finish before anything else is recorded
        self.shutdown.cancel();
        scheduler.join().await;

        if reason == StopReason::Drained && self.cancelled.load(Ordering::Acquire) {
            debug!("Stop requested after the network drained");
        }

        if reason == StopReason::Cancelled {
            let (slot, timestamp) = self.audit.reserve(|| self.clock.now());
            slot.fill(LogRecord::cancelled(timestamp));
            info!("Simulation cancelled by operator");
        } else {
            info!("All entities left the network");
        }

        self.status.set(RunStatus::Stopped);
        self.audit.finalize();
        reason
    }

    /// Check the phase conditions; returns true once the network is drained
    fn evaluate(&self) -> bool {
        let locked = self.population.lock_all();

        match self.status.get() {
            RunStatus::Running => {
                let live = locked.total();
                let in_end = locked.occupancy(self.end_state);
                if locked.admitted() > 0 && in_end == live {
                    self.status.set(RunStatus::Draining);
                    info!(
                        "All {} live entities reached the end state; draining (admitted {}, removed {})",
                        live,
                        locked.admitted(),
                        locked.removed()
                    );
                    return live == 0;
                }
                false
            }
            RunStatus::Draining => locked.total() == 0,
            RunStatus::Idle | RunStatus::Stopped => true,
        }
    }
}
