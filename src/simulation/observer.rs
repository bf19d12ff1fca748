//! Occupancy observers
//!
//! An observer is told about the occupancy of every state after each firing
//! that moved an entity. Delivery is best-effort and must never block the
//! trigger task that performed the firing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::simulation::OccupancySnapshot;

/// Receives occupancy snapshots after successful firings
pub trait OccupancyObserver: Send + Sync {
    /// Called from trigger tasks; implementations must not block
    fn on_snapshot(&self, snapshot: &OccupancySnapshot);
}

/// Observer forwarding snapshots over a bounded channel
///
/// Snapshots that do not fit in the channel are dropped and counted.
pub struct ChannelObserver {
    sender: mpsc::Sender<OccupancySnapshot>,
    dropped: AtomicU64,
}

impl fmt::Debug for ChannelObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelObserver").field("dropped", &self.dropped()).finish()
    }
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<OccupancySnapshot>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender, dropped: AtomicU64::new(0) }, receiver)
    }

    /// Number of snapshots dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl OccupancyObserver for ChannelObserver {
    fn on_snapshot(&self, snapshot: &OccupancySnapshot) {
        match self.sender.try_send(snapshot.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Observer channel full, snapshot dropped");
            }
            Err(TrySendError::Closed(_)) => debug!("Observer channel closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::StateOccupancy;

    fn snapshot(occupancy: usize) -> OccupancySnapshot {
        OccupancySnapshot {
            states: vec![StateOccupancy { name: "A".to_string(), occupancy, capacity: 5 }],
        }
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (observer, mut receiver) = ChannelObserver::channel(1);
        observer.on_snapshot(&snapshot(1));
        observer.on_snapshot(&snapshot(2));

        assert_eq!(observer.dropped(), 1);
        assert_eq!(receiver.try_recv().unwrap().get("A"), Some(1));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (observer, receiver) = ChannelObserver::channel(4);
        drop(receiver);
        observer.on_snapshot(&snapshot(1));
        assert_eq!(observer.dropped(), 0);
    }
}
