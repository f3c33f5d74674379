// Status board - Latest machine-status frame for the selected plant
use crate::application::error_reporter::ErrorReporter;
use crate::application::live_feed::{FeedEvent, FeedSink, FeedTarget, LiveFeed};
use crate::domain::error::ReconcileError;
use crate::domain::machine_status::StatusSnapshot;
use crate::domain::sample::PlantId;
use crate::infrastructure::wire;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusBoard {
    pub plant_id: Option<PlantId>,
    pub snapshot: StatusSnapshot,
}

pub type SharedStatus = Arc<RwLock<StatusBoard>>;

impl StatusBoard {
    /// Frames replace the previous snapshot wholesale.
    pub fn apply_frame(&mut self, frame: &str) -> Result<(), ReconcileError> {
        self.snapshot = wire::decode_status_frame(frame)?;
        Ok(())
    }

    fn retarget(&mut self, plant_id: PlantId) {
        self.plant_id = Some(plant_id);
        self.snapshot = StatusSnapshot::default();
    }
}

/// Follows the selected plant, reopening the status feed whenever it changes.
///
/// Returns when the plant sender is dropped. A feed that gives up leaves the
/// last snapshot in place until the next plant change.
pub async fn run_status_stream(
    board: SharedStatus,
    feed: Arc<dyn LiveFeed>,
    mut plant: watch::Receiver<PlantId>,
    reporter: Arc<dyn ErrorReporter>,
) {
    loop {
        let plant_id = plant.borrow_and_update().clone();
        if let Ok(mut board) = board.write() {
            board.retarget(plant_id.clone());
        }

        let (tx, mut events) = mpsc::unbounded_channel();
        let target = FeedTarget::MachineStatus { plant_id };
        tracing::info!("Opening {}", target);
        let handle = feed.open(target.clone(), FeedSink::from_channel(tx));

        loop {
            tokio::select! {
                changed = plant.changed() => {
                    if changed.is_err() {
                        tracing::info!("Status stream stopped");
                        return;
                    }
                    break;
                }
                event = events.recv() => match event {
                    Some(FeedEvent::Frame(frame)) => {
                        let result = match board.write() {
                            Ok(mut board) => board.apply_frame(&frame),
                            Err(_) => return,
                        };
                        if let Err(e) = result {
                            reporter.report(&e);
                        }
                    }
                    Some(FeedEvent::Reconnecting { attempt, reason }) => {
                        reporter.report(&ReconcileError::TransportClosed {
                            feed: target.to_string(),
                            reason: format!("{} (reconnect attempt {})", reason, attempt),
                            retrying: true,
                        });
                    }
                    Some(FeedEvent::Closed { reason }) => {
                        reporter.report(&ReconcileError::TransportClosed {
                            feed: target.to_string(),
                            reason,
                            retrying: false,
                        });
                        if plant.changed().await.is_err() {
                            return;
                        }
                        break;
                    }
                    None => {
                        if plant.changed().await.is_err() {
                            return;
                        }
                        break;
                    }
                },
            }
        }

        handle.close();
    }
}
