// Live feed trait, handles and reconnect policy
use crate::domain::sample::{MachineId, PlantId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedTarget {
    Telemetry { machine_id: MachineId, plant_id: PlantId },
    MachineStatus { plant_id: PlantId },
    Notifications,
}

impl fmt::Display for FeedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedTarget::Telemetry { machine_id, plant_id } => {
                write!(f, "data-stream(machine={}, plant={})", machine_id, plant_id)
            }
            FeedTarget::MachineStatus { plant_id } => {
                write!(f, "machine-status(plant={})", plant_id)
            }
            FeedTarget::Notifications => f.write_str("notification-stream"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// One JSON text frame, undecoded.
    Frame(String),
    /// The transport dropped and another attempt is scheduled.
    Reconnecting { attempt: u32, reason: String },
    /// The transport dropped and the policy gave up. Nothing follows.
    Closed { reason: String },
}

/// Where a feed delivers its events. `deliver` returns false once nobody is listening.
#[derive(Clone)]
pub struct FeedSink {
    deliver: Arc<dyn Fn(FeedEvent) -> bool + Send + Sync>,
}

impl FeedSink {
    pub fn new(deliver: impl Fn(FeedEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn from_channel(tx: mpsc::UnboundedSender<FeedEvent>) -> Self {
        Self::new(move |event| tx.send(event).is_ok())
    }

    pub fn deliver(&self, event: FeedEvent) -> bool {
        (self.deliver)(event)
    }
}

impl fmt::Debug for FeedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FeedSink")
    }
}

/// Ownership of one open feed. Dropping the handle closes the feed.
pub struct FeedHandle {
    close: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedHandle {
    pub fn new(close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            close: Some(Box::new(close)),
        }
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if let Some(close) = self.close.take() {
            close();
        }
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("open", &self.close.is_some())
            .finish()
    }
}

pub trait LiveFeed: Send + Sync {
    /// Opens a feed. It stays open, reconnecting per its policy, until the handle is dropped.
    fn open(&self, target: FeedTarget, sink: FeedSink) -> FeedHandle;
}

/// Bounded exponential backoff for dropped transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` once attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial_backoff.saturating_mul(factor).min(self.max_backoff))
    }
}
