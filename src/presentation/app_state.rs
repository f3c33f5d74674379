// Application state for HTTP handlers
use crate::application::notification_center::SharedNotifications;
use crate::application::reports::ReportService;
use crate::application::status_board::SharedStatus;
use crate::application::subscription_manager::ViewCommand;
use crate::domain::dashboard::ViewSnapshot;
use crate::domain::sample::PlantId;
use tokio::sync::{mpsc, watch};

pub struct AppState {
    pub snapshots: watch::Receiver<ViewSnapshot>,
    pub commands: mpsc::Sender<ViewCommand>,
    pub notifications: SharedNotifications,
    pub status: SharedStatus,
    pub reports: ReportService,
    /// Selected plant, followed by the status stream.
    pub plant: watch::Sender<PlantId>,
}
