//! Trigger scheduling
//!
//! The [`Scheduler`] spawns one tokio task per transition. Each task owns a
//! periodic timer and its own random number generator, so triggers never wait
//! on each other except through the state locks the executor takes.
//!
//! A task fires, waits for the firing to complete, then waits for its next
//! tick; firings of one transition never overlap. Missed ticks are delayed
//! rather than bursted.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::simulation::{Executor, StatusCell};
use crate::topology::Transition;
use crate::types::{RunStatus, SimulationConfig};

/// Shortest period a trigger may have
pub const MIN_TRIGGER_PERIOD: Duration = Duration::from_millis(1);

/// Longest period a trigger may have; slower transitions wait this long
pub const MAX_TRIGGER_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Wall-clock period between firings of a transition
///
/// `frequency` attempts per `time_unit_secs` simulated seconds, with simulated
/// time running `multiplier` times faster than wall time. The result is kept
/// within [`MIN_TRIGGER_PERIOD`] and [`MAX_TRIGGER_PERIOD`].
pub fn trigger_period(frequency: f64, time_unit_secs: f64, multiplier: f64) -> Duration {
    let seconds = time_unit_secs / frequency / multiplier;
    if seconds.is_nan() || seconds <= 0.0 {
        return MIN_TRIGGER_PERIOD;
    }
    Duration::try_from_secs_f64(seconds)
        .map_or(MAX_TRIGGER_PERIOD, |period| period.clamp(MIN_TRIGGER_PERIOD, MAX_TRIGGER_PERIOD))
}

/// Running trigger tasks of one simulation
#[derive(Debug)]
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Spawn one trigger task per transition on the current runtime
    #[instrument(skip_all, fields(simulation = %executor.topology().name()))]
    pub(crate) fn spawn(
        executor: Arc<Executor>,
        status: Arc<StatusCell>,
        config: &SimulationConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let transitions = executor.topology().transitions().to_vec();
        let mut handles = Vec::with_capacity(transitions.len());

        for transition in transitions {
            let period =
                trigger_period(transition.frequency, config.time_unit_secs, config.time_multiplier);
            let rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(transition.index as u64 + 1)),
                None => StdRng::from_entropy(),
            };
            debug!(
                "Trigger for {} every {:?}",
                executor.topology().describe(&transition),
                period
            );

            handles.push(tokio::spawn(run_trigger(
                executor.clone(),
                status.clone(),
                transition,
                period,
                shutdown.clone(),
                rng,
            )));
        }

        info!("Scheduled {} transition triggers", handles.len());
        Self { handles, shutdown }
    }

    /// Number of trigger tasks
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no trigger task was spawned
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Prevent future firings; in-flight firings still complete
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for every trigger task to finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Trigger task ended abnormally: {}", e);
            }
        }
    }
}

async fn run_trigger(
    executor: Arc<Executor>,
    status: Arc<StatusCell>,
    transition: Transition,
    period: Duration,
    shutdown: CancellationToken,
    mut rng: StdRng,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if shutdown.is_cancelled() {
            break;
        }

        match status.get() {
            RunStatus::Draining if !transition.is_egress() => {
                debug!("Trigger for transition #{} disabled while draining", transition.index);
                break;
            }
            RunStatus::Stopped => break,
            _ => {}
        }

        executor.fire(&transition, &mut rng);
    }
}
