// Presentation layer - HTTP display sink for the running view
pub mod app_state;
pub mod handlers;
pub mod view_adapter;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    health_check, update_selection, view_chart, view_daily_failures, view_kpis,
    view_machine_failures, view_notifications, view_status, view_stream, view_table,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/view/chart", get(view_chart))
        .route("/view/table", get(view_table))
        .route("/view/status", get(view_status))
        .route("/view/notifications", get(view_notifications))
        .route("/view/failures/daily", get(view_daily_failures))
        .route("/view/failures/machines", get(view_machine_failures))
        .route("/view/kpis", get(view_kpis))
        .route("/view/stream", get(view_stream))
        .route("/view/selection", post(update_selection))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
