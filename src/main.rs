// Main entry point - Dependency injection and server setup
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use plant_dashboard::application::clock::SystemClock;
use plant_dashboard::application::error_reporter::{ErrorReporter, TracingErrorReporter};
use plant_dashboard::application::live_feed::{FeedSink, FeedTarget, LiveFeed};
use plant_dashboard::application::notification_center::{
    run_notification_stream, seed_notifications, NotificationCenter, SharedNotifications,
};
use plant_dashboard::application::reports::ReportService;
use plant_dashboard::application::status_board::{run_status_stream, SharedStatus, StatusBoard};
use plant_dashboard::application::subscription_manager::{
    SubscriptionManager, ViewDependencies,
};
use plant_dashboard::infrastructure::backend_client::BackendClient;
use plant_dashboard::infrastructure::config::load_dashboard_config;
use plant_dashboard::infrastructure::ws_feed::WsFeed;
use plant_dashboard::presentation::app_state::AppState;
use plant_dashboard::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_dashboard_config()?;
    let selection = config.view.to_selection()?;

    // Backend adapters (infrastructure layer)
    let client = Arc::new(BackendClient::new(
        config.backend.http_url.clone(),
        config.backend.token.clone(),
    ));
    let feed: Arc<dyn LiveFeed> = Arc::new(WsFeed::new(
        config.backend.ws_url.clone(),
        config.feed.policy(),
    ));
    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingErrorReporter);

    // The view (application layer)
    let deps = ViewDependencies {
        source: client.clone(),
        feed: feed.clone(),
        reporter: reporter.clone(),
        clock: Arc::new(SystemClock),
    };
    let mut manager = SubscriptionManager::new(deps, &selection)?;
    let snapshots = manager.subscribe();
    manager.start(selection.machines.clone());

    let (commands, command_rx) = mpsc::channel(32);
    let view_task = tokio::spawn(manager.run(command_rx));

    // Notification center, seeded before the stream opens
    let notifications: SharedNotifications = Arc::new(RwLock::new(NotificationCenter::new()));
    seed_notifications(&notifications, client.as_ref()).await;
    let (notification_tx, notification_rx) = mpsc::unbounded_channel();
    let notification_feed = feed.open(
        FeedTarget::Notifications,
        FeedSink::from_channel(notification_tx),
    );
    tokio::spawn(run_notification_stream(
        notifications.clone(),
        notification_rx,
        reporter.clone(),
    ));

    // Machine status board for the selected plant
    let status: SharedStatus = Arc::new(RwLock::new(StatusBoard::default()));
    let (plant, plant_rx) = watch::channel(selection.plant_id.clone());
    tokio::spawn(run_status_stream(status.clone(), feed.clone(), plant_rx, reporter.clone()));

    let state = Arc::new(AppState {
        snapshots,
        commands,
        notifications,
        status,
        reports: ReportService::new(client.clone()),
        plant,
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        "Starting plant-dashboard on {} (plant {}, {} machines)",
        config.server.bind,
        selection.plant_id,
        selection.machines.len()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last command sender, so the view tears itself down
    notification_feed.close();
    match tokio::time::timeout(Duration::from_secs(5), view_task).await {
        Ok(Err(e)) => tracing::error!("View task failed: {}", e),
        Err(_) => tracing::warn!("View did not stop within 5s"),
        Ok(Ok(())) => {}
    }
    tracing::info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
