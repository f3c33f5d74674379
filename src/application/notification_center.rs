// Notification center - Seeded from REST, kept current by the notification stream
use crate::application::error_reporter::ErrorReporter;
use crate::application::live_feed::FeedEvent;
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::error::ReconcileError;
use crate::domain::notification::{group_bundles, Notification, NotificationBundle};
use crate::domain::series::merge_keyed;
use crate::infrastructure::wire;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Deduplicated notification history. Replays of the same breach collapse into one entry.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    notifications: Vec<Notification>,
}

pub type SharedNotifications = Arc<RwLock<NotificationCenter>>;

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, notifications: Vec<Notification>) {
        self.notifications = merge_keyed(&self.notifications, notifications);
    }

    /// Decodes and merges one stream frame.
    pub fn ingest_frame(&mut self, frame: &str) -> Result<(), ReconcileError> {
        let notification = wire::decode_notification_frame(frame)?;
        self.notifications = merge_keyed(&self.notifications, vec![notification]);
        Ok(())
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn bundles(&self) -> Vec<NotificationBundle> {
        group_bundles(&self.notifications)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

/// Loads the initial list. A failed load leaves the center empty and is only logged.
pub async fn seed_notifications(center: &SharedNotifications, source: &dyn TelemetrySource) {
    match source.fetch_notifications().await {
        Ok(notifications) => {
            tracing::info!("Loaded {} notifications", notifications.len());
            if let Ok(mut center) = center.write() {
                center.seed(notifications);
            }
        }
        Err(e) => tracing::warn!("Failed to load notifications: {:#}", e),
    }
}

/// Applies notification feed events until the feed closes or the channel is dropped.
pub async fn run_notification_stream(
    center: SharedNotifications,
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
    reporter: Arc<dyn ErrorReporter>,
) {
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Frame(frame) => {
                let result = match center.write() {
                    Ok(mut center) => center.ingest_frame(&frame),
                    Err(_) => break,
                };
                if let Err(e) = result {
                    reporter.report(&e);
                }
            }
            FeedEvent::Reconnecting { attempt, reason } => {
                reporter.report(&ReconcileError::TransportClosed {
                    feed: "notification-stream".to_string(),
                    reason: format!("{} (reconnect attempt {})", reason, attempt),
                    retrying: true,
                });
            }
            FeedEvent::Closed { reason } => {
                reporter.report(&ReconcileError::TransportClosed {
                    feed: "notification-stream".to_string(),
                    reason,
                    retrying: false,
                });
                break;
            }
        }
    }
    tracing::info!("Notification stream stopped");
}
