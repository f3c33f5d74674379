// Application layer - View reconciliation and the seams it depends on
pub mod clock;
pub mod error_reporter;
pub mod live_feed;
pub mod notification_center;
pub mod report_source;
pub mod reports;
pub mod series_store;
pub mod status_board;
pub mod subscription_manager;
pub mod telemetry_source;
