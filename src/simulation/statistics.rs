//! Statistics collection and reporting
//!
//! This module contains the firing counters shared by every trigger task and
//! the report produced when a run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::simulation::OccupancySnapshot;
use crate::types::{RunId, RunStatus};

/// Lock-free firing counters, updated from every trigger task
#[derive(Debug, Default)]
pub struct RuntimeStatistics {
    attempts: AtomicU64,
    skipped: AtomicU64,
    blocked: AtomicU64,
    disabled: AtomicU64,
    entered: AtomicU64,
    moved: AtomicU64,
    removed: AtomicU64,
    runtime_errors: AtomicU64,
    message_failures: AtomicU64,
}

impl RuntimeStatistics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disabled(&self) {
        self.disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_entered(&self) {
        self.entered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_moved(&self) {
        self.moved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_runtime_error(&self) {
        self.runtime_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_failure(&self) {
        self.message_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current counter values
    pub fn counts(&self) -> FiringCounts {
        FiringCounts {
            attempts: self.attempts.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            disabled: self.disabled.load(Ordering::Relaxed),
            entered: self.entered.load(Ordering::Relaxed),
            moved: self.moved.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            runtime_errors: self.runtime_errors.load(Ordering::Relaxed),
            message_failures: self.message_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RuntimeStatistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FiringCounts {
    /// Scheduled firings that reached the probability gate
    pub attempts: u64,
    /// Firings stopped by the probability gate
    pub skipped: u64,
    /// Firings that passed the gate but were not feasible
    pub blocked: u64,
    /// Firings refused because the run phase no longer allowed them
    pub disabled: u64,
    /// Entities admitted
    pub entered: u64,
    /// Entities moved between states
    pub moved: u64,
    /// Entities removed
    pub removed: u64,
    /// Firings skipped after an internal lookup failure
    pub runtime_errors: u64,
    /// Messages replaced by an error string
    pub message_failures: u64,
}

impl FiringCounts {
    /// Firings that changed the population
    pub fn successful(&self) -> u64 {
        self.entered + self.moved + self.removed
    }

    /// Share of gated firings that were blocked
    pub fn blocked_percentage(&self) -> f64 {
        let gated = self.successful() + self.blocked;
        if gated == 0 {
            0.0
        } else {
            (self.blocked as f64 / gated as f64) * 100.0
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unique identifier of the run
    pub run_id: RunId,
    /// Simulation name
    pub simulation_name: String,
    /// Final status
    pub status: RunStatus,
    /// Whether the run ended through operator cancellation
    pub cancelled: bool,
    /// Entities ever admitted
    pub admitted: u64,
    /// Entities removed through egress
    pub removed: u64,
    /// Entities still inside the network
    pub remaining: u64,
    /// Firing counters
    pub firings: FiringCounts,
    /// Occupancy of every state when the run ended
    pub final_occupancy: OccupancySnapshot,
    /// Wall-clock run time in seconds
    pub wall_seconds: f64,
    /// Simulated time when the run ended
    pub simulated_end: DateTime<Utc>,
    /// Audit records written
    pub audit_records: u64,
    /// Audit log file, if the run wrote one
    pub audit_log: Option<PathBuf>,
    /// Whether the audit sink failed during the run
    pub audit_sink_failed: bool,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation Report: {} ({})", self.simulation_name, self.run_id)?;
        writeln!(
            f,
            "  Status: {}{}",
            self.status,
            if self.cancelled { " (cancelled)" } else { "" }
        )?;
        writeln!(f, "  Admitted: {}", self.admitted)?;
        writeln!(f, "  Removed: {}", self.removed)?;
        writeln!(f, "  Remaining: {}", self.remaining)?;
        writeln!(f, "  Moves: {}", self.firings.moved)?;
        writeln!(
            f,
            "  Blocked Firings: {} ({:.1}%)",
            self.firings.blocked,
            self.firings.blocked_percentage()
        )?;
        writeln!(f, "  Skipped By Probability: {}", self.firings.skipped)?;
        if self.firings.runtime_errors > 0 {
            writeln!(f, "  Runtime Errors: {}", self.firings.runtime_errors)?;
        }
        if self.firings.message_failures > 0 {
            writeln!(f, "  Message Failures: {}", self.firings.message_failures)?;
        }
        writeln!(f, "  Final Occupancy: {}", self.final_occupancy)?;
        writeln!(f, "  Simulated End: {}", self.simulated_end.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "  Wall Time: {:.1}s", self.wall_seconds)?;
        write!(f, "  Audit Records: {}", self.audit_records)?;
        if self.audit_sink_failed {
            write!(f, " (sink failed, log incomplete)")?;
        }
        Ok(())
    }
}
