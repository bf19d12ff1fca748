//! Simulated time
//!
//! Simulated time advances `multiplier` times faster than wall time from a
//! fixed origin. Elapsed time is measured with the tokio clock, so paused-time
//! tests see simulated time advance exactly with `tokio::time::advance`.

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;
use tracing::debug;

/// Clock mapping elapsed wall time onto simulated timestamps
#[derive(Debug, Clone)]
pub struct SimClock {
    origin: DateTime<Utc>,
    started: Instant,
    multiplier: f64,
}

impl SimClock {
    /// Start a clock at `origin`, running `multiplier` times faster than wall time
    pub fn new(origin: DateTime<Utc>, multiplier: f64) -> Self {
        debug!("Simulated clock starts at {} ({}x)", origin, multiplier);
        Self { origin, started: Instant::now(), multiplier }
    }

    /// Simulated time at the moment of the call
    ///
    /// Saturates at the latest representable timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        self.origin
            .checked_add_signed(self.simulated_elapsed())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Simulated time elapsed since the clock started
    pub fn simulated_elapsed(&self) -> Duration {
        let real = self.started.elapsed().as_secs_f64();
        Duration::microseconds((real * self.multiplier * 1_000_000.0) as i64)
    }

    /// Wall time elapsed since the clock started
    pub fn wall_elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    /// Simulated time at which the clock started
    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Simulated seconds per wall second
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_time_scales_with_multiplier() {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let clock = SimClock::new(origin, 60.0);
        assert_eq!(clock.now(), origin);

        tokio::time::advance(std::time::Duration::from_secs(2)).await;

        assert_eq!(clock.simulated_elapsed(), Duration::minutes(2));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 1, 8, 2, 0).unwrap());
        assert_eq!(clock.wall_elapsed(), std::time::Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_multiplier_saturates() {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let clock = SimClock::new(origin, 1e13);

        tokio::time::advance(std::time::Duration::from_secs(60)).await;
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);

        tokio::time::advance(std::time::Duration::from_secs(3600)).await;
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
    }
}
