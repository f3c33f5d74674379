// HTTP request handlers
use crate::application::subscription_manager::ViewCommand;
use crate::domain::error::ReconcileError;
use crate::domain::sample::{MachineId, Parameter, PlantId};
use crate::domain::timeframe::ViewMode;
use crate::presentation::app_state::AppState;
use crate::presentation::view_adapter::{
    chart_view, failure_chart, kpi_view, machine_failure_bars, notification_cards, status_view,
    table_rows, ChartView, FailureChart, KpiView, MachineFailureBar, NotificationCard, StatusView,
    TableRow,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

type HandlerError = (StatusCode, String);

#[derive(Deserialize)]
pub struct ChartQuery {
    pub parameter: Parameter,
}

#[derive(Deserialize)]
pub struct MonthQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Deserialize)]
pub struct KpiQuery {
    pub machine_id: MachineId,
}

/// Partial update of the running view. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct SelectionUpdate {
    pub plant_id: Option<PlantId>,
    pub machines: Option<Vec<MachineId>>,
    pub mode: Option<ViewMode>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Bad input is a 400, anything the backend did is a 502.
fn report_error(e: anyhow::Error) -> HandlerError {
    if let Some(ReconcileError::InvalidConfiguration(reason)) = e.downcast_ref::<ReconcileError>() {
        return (StatusCode::BAD_REQUEST, reason.clone());
    }
    tracing::warn!("Report failed: {:#}", e);
    (StatusCode::BAD_GATEWAY, format!("{:#}", e))
}

pub async fn view_chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
) -> Json<ChartView> {
    let snapshot = state.snapshots.borrow().clone();
    Json(chart_view(&snapshot, query.parameter))
}

pub async fn view_table(State(state): State<Arc<AppState>>) -> Json<Vec<TableRow>> {
    let snapshot = state.snapshots.borrow().clone();
    Json(table_rows(&snapshot))
}

pub async fn view_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusView>, HandlerError> {
    let board = state
        .status
        .read()
        .map_err(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "status board unavailable".to_string())
        })?;
    Ok(Json(status_view(&board)))
}

pub async fn view_notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NotificationCard>>, HandlerError> {
    let bundles = state
        .notifications
        .read()
        .map_err(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "notifications unavailable".to_string())
        })?
        .bundles();
    Ok(Json(notification_cards(&bundles)))
}

/// Failures per day for every machine of the running view.
pub async fn view_daily_failures(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<FailureChart>, HandlerError> {
    let (plant_id, machines) = {
        let snapshot = state.snapshots.borrow();
        let machines: Vec<MachineId> =
            snapshot.machines.iter().map(|p| p.machine_id.clone()).collect();
        (snapshot.plant_id.clone(), machines)
    };

    let rows = state
        .reports
        .failures_per_day(&plant_id, &machines, query.month, query.year)
        .await
        .map_err(report_error)?;
    Ok(Json(failure_chart(&rows, &machines)))
}

pub async fn view_machine_failures(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MachineFailureBar>>, HandlerError> {
    let plant_id = state.snapshots.borrow().plant_id.clone();
    let totals = state
        .reports
        .failures_per_machine(&plant_id)
        .await
        .map_err(report_error)?;
    Ok(Json(machine_failure_bars(&totals)))
}

/// KPIs for one machine, over the view's range when it is historical.
pub async fn view_kpis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KpiQuery>,
) -> Result<Json<KpiView>, HandlerError> {
    let (plant_id, mode) = {
        let snapshot = state.snapshots.borrow();
        (snapshot.plant_id.clone(), snapshot.mode)
    };

    let kpis = state
        .reports
        .kpis(&query.machine_id, &plant_id, mode)
        .await
        .map_err(report_error)?;
    Ok(Json(kpi_view(&query.machine_id, kpis.as_ref())))
}

/// One `snapshot` event per view mutation.
pub async fn view_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.snapshots.clone()).map(|snapshot| {
        let event = match Event::default().event("snapshot").json_data(&snapshot) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Failed to encode snapshot {}: {}", snapshot.version, e);
                Event::default().event("error").data(e.to_string())
            }
        };
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn update_selection(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SelectionUpdate>,
) -> Result<StatusCode, HandlerError> {
    if let Some(mode) = &update.mode {
        mode.validate()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    }

    let mut commands = Vec::new();
    if let Some(plant_id) = update.plant_id {
        state.plant.send_replace(plant_id.clone());
        commands.push(ViewCommand::SetPlant(plant_id));
    }
    if let Some(mode) = update.mode {
        commands.push(ViewCommand::SetMode(mode));
    }
    if let Some(machines) = update.machines {
        commands.push(ViewCommand::SetMachines(machines));
    }

    for command in commands {
        tracing::info!("Selection update: {:?}", command);
        state
            .commands
            .send(command)
            .await
            .map_err(|_| (StatusCode::SERVICE_UNAVAILABLE, "view is not running".to_string()))?;
    }

    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notification_center::NotificationCenter;
    use crate::application::report_source::{FailureRequest, KpiRequest, ReportSource};
    use crate::application::reports::ReportService;
    use crate::application::status_board::StatusBoard;
    use crate::domain::dashboard::ViewSnapshot;
    use crate::domain::failures::{DailyFailures, MachineFailures, MachineKpis};
    use crate::domain::timeframe::Timeframe;
    use async_trait::async_trait;
    use std::sync::RwLock;
    use tokio::sync::{mpsc, watch};

    struct FakeReports {
        kpis_fail: bool,
    }

    #[async_trait]
    impl ReportSource for FakeReports {
        async fn fetch_daily_failures(
            &self,
            _request: &FailureRequest,
        ) -> anyhow::Result<Vec<DailyFailures>> {
            Ok(Vec::new())
        }

        async fn fetch_machine_failures(
            &self,
            _plant_id: &PlantId,
        ) -> anyhow::Result<Vec<MachineFailures>> {
            Ok(vec![MachineFailures {
                machine_id: MachineId::new("3").unwrap(),
                failures: 6,
            }])
        }

        async fn fetch_kpis(&self, _request: &KpiRequest) -> anyhow::Result<Option<MachineKpis>> {
            if self.kpis_fail {
                anyhow::bail!("backend returned 500");
            }
            Ok(None)
        }
    }

    type Fixture = (Arc<AppState>, mpsc::Receiver<ViewCommand>, watch::Receiver<PlantId>);

    fn state() -> Fixture {
        state_with(FakeReports { kpis_fail: false })
    }

    fn state_with(reports: FakeReports) -> Fixture {
        let plant_id = PlantId::new("1").unwrap();
        let (_snapshot_tx, snapshots) = watch::channel(ViewSnapshot::empty(
            plant_id.clone(),
            ViewMode::RealTime {
                timeframe: Timeframe::FiveMinutes,
            },
            Parameter::ALL.to_vec(),
        ));
        let (commands, command_rx) = mpsc::channel(8);
        let (plant, plant_rx) = watch::channel(plant_id);

        let state = Arc::new(AppState {
            snapshots,
            commands,
            notifications: Arc::new(RwLock::new(NotificationCenter::new())),
            status: Arc::new(RwLock::new(StatusBoard::default())),
            reports: ReportService::new(Arc::new(reports)),
            plant,
        });
        (state, command_rx, plant_rx)
    }

    #[tokio::test]
    async fn test_selection_update_forwards_commands() {
        let (state, mut commands, plant) = state();
        let update: SelectionUpdate = serde_json::from_str(
            r#"{"plant_id": "2", "machines": ["1", "4"],
                "mode": {"kind": "historical", "start_ms": 0, "end_ms": 1000}}"#,
        )
        .unwrap();

        let status = update_selection(State(state), Json(update)).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(plant.borrow().as_str(), "2");
        assert_eq!(
            commands.recv().await,
            Some(ViewCommand::SetPlant(PlantId::new("2").unwrap()))
        );
        assert!(matches!(
            commands.recv().await,
            Some(ViewCommand::SetMode(ViewMode::Historical { .. }))
        ));
        assert!(matches!(
            commands.recv().await,
            Some(ViewCommand::SetMachines(m)) if m.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_inverted_range_is_bad_request() {
        let (state, mut commands, _plant) = state();
        let update = SelectionUpdate {
            mode: Some(ViewMode::Historical {
                start_ms: 10,
                end_ms: 0,
            }),
            ..SelectionUpdate::default()
        };

        let err = update_selection(State(state), Json(update)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stopped_view_is_unavailable() {
        let (state, commands, _plant) = state();
        drop(commands);
        let update = SelectionUpdate {
            machines: Some(Vec::new()),
            ..SelectionUpdate::default()
        };
        let err = update_selection(State(state), Json(update)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_status_defaults_to_zero_slices() {
        let (state, _commands, _plant) = state();
        let Json(view) = view_status(State(state)).await.unwrap();
        assert!(view.slices.iter().all(|s| s.value == 0));
    }

    #[tokio::test]
    async fn test_overflowing_range_is_bad_request() {
        let (state, mut commands, _plant) = state();
        let update = SelectionUpdate {
            mode: Some(ViewMode::Historical {
                start_ms: -1,
                end_ms: i64::MAX,
            }),
            ..SelectionUpdate::default()
        };

        let err = update_selection(State(state), Json(update)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_month_is_bad_request() {
        let (state, _commands, _plant) = state();
        let query = MonthQuery { month: 0, year: 2024 };
        let err = view_daily_failures(State(state), Query(query)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_machine_failures_are_labelled() {
        let (state, _commands, _plant) = state();
        let Json(bars) = view_machine_failures(State(state)).await.unwrap();
        assert_eq!(bars[0].label, "Machine 3");
        assert_eq!(bars[0].failures, 6);
    }

    #[tokio::test]
    async fn test_kpi_backend_failure_is_bad_gateway() {
        let (state, _commands, _plant) = state_with(FakeReports { kpis_fail: true });
        let query = KpiQuery {
            machine_id: MachineId::new("1").unwrap(),
        };
        let err = view_kpis(State(state), Query(query)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_kpis_without_record_are_unavailable() {
        let (state, _commands, _plant) = state();
        let query = KpiQuery {
            machine_id: MachineId::new("1").unwrap(),
        };
        let Json(view) = view_kpis(State(state), Query(query)).await.unwrap();
        assert_eq!(view.uptime, "Unavailable");
    }
}
