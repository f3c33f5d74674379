// End-to-end reconciliation through the public API
use async_trait::async_trait;
use plant_dashboard::application::clock::ManualClock;
use plant_dashboard::application::error_reporter::TracingErrorReporter;
use plant_dashboard::application::live_feed::{
    FeedEvent, FeedHandle, FeedSink, FeedTarget, LiveFeed,
};
use plant_dashboard::application::subscription_manager::{
    EventOutcome, SubscriptionManager, ViewCommand, ViewDependencies,
};
use plant_dashboard::application::telemetry_source::{HistoryRequest, TelemetrySource};
use plant_dashboard::domain::aggregation::{aggregate, Bucket};
use plant_dashboard::domain::dashboard::{MachineState, ViewSelection};
use plant_dashboard::domain::notification::Notification;
use plant_dashboard::domain::sample::{MachineId, Parameter, PlantId, Sample};
use plant_dashboard::domain::timeframe::{AggregationWindow, Timeframe, ViewMode};
use plant_dashboard::presentation::view_adapter::{chart_view, table_rows, TraceKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedSource;

#[async_trait]
impl TelemetrySource for ScriptedSource {
    async fn fetch_history(&self, request: &HistoryRequest) -> anyhow::Result<Vec<Sample>> {
        let sample = |ts: i64, value: f64| {
            Sample::new(request.machine_id.clone(), ts).with(Parameter::Temperature, value)
        };
        // Out of order with a duplicate, as the backend may return it
        Ok(vec![sample(61_000, 20.0), sample(0, 10.0), sample(61_000, 20.0)])
    }

    async fn fetch_notifications(&self) -> anyhow::Result<Vec<Notification>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct ChannelFeed {
    open: Arc<AtomicUsize>,
    sinks: Mutex<Vec<FeedSink>>,
}

impl LiveFeed for ChannelFeed {
    fn open(&self, _target: FeedTarget, sink: FeedSink) -> FeedHandle {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(sink);
        let open = self.open.clone();
        FeedHandle::new(move || {
            open.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

async fn next(manager: &mut SubscriptionManager) -> EventOutcome {
    tokio::time::timeout(Duration::from_secs(1), manager.next_event())
        .await
        .expect("timed out")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_history_and_push_reconcile_into_one_series() {
    let feed = Arc::new(ChannelFeed::default());
    let deps = ViewDependencies {
        source: Arc::new(ScriptedSource),
        feed: feed.clone(),
        reporter: Arc::new(TracingErrorReporter),
        clock: Arc::new(ManualClock::new(120_000)),
    };
    let machine = MachineId::new("1").unwrap();
    let selection = ViewSelection {
        plant_id: PlantId::new("1").unwrap(),
        machines: vec![machine.clone()],
        mode: ViewMode::RealTime {
            timeframe: Timeframe::FiveMinutes,
        },
        parameters: vec![Parameter::Temperature],
        focus: None,
    };

    let mut manager = SubscriptionManager::new(deps, &selection).unwrap();
    let snapshots = manager.subscribe();
    manager.start(selection.machines.clone());

    assert_eq!(next(&mut manager).await, EventOutcome::Applied);
    assert_eq!(manager.machine_state(&machine), Some(MachineState::Live));
    assert_eq!(feed.open.load(Ordering::SeqCst), 1);

    let sink = feed.sinks.lock().unwrap()[0].clone();
    sink.deliver(FeedEvent::Frame(
        r#"[{"machine_id": 1, "plant_id": 1, "time": 61000, "temperature": 25}]"#.to_string(),
    ));
    assert_eq!(next(&mut manager).await, EventOutcome::Applied);

    let series = manager.series(&machine).unwrap();
    let points: Vec<(i64, f64)> = series
        .iter()
        .map(|s| (s.timestamp_ms, s.value(Parameter::Temperature).unwrap()))
        .collect();
    assert_eq!(points, vec![(0, 10.0), (61_000, 25.0)]);

    let minute = AggregationWindow::from_millis(60_000).unwrap();
    assert_eq!(
        aggregate(series, Parameter::Temperature, minute, 0, 120_000),
        vec![
            Bucket {
                window_start_ms: 0,
                value: 10.0
            },
            Bucket {
                window_start_ms: 60_000,
                value: 25.0
            },
        ]
    );

    let snapshot = snapshots.borrow().clone();
    let chart = chart_view(&snapshot, Parameter::Temperature);
    assert_eq!(chart.traces[0].kind, TraceKind::Series);
    assert_eq!(chart.traces[0].points.last().map(|p| p.value), Some(25.0));
    assert_eq!(table_rows(&snapshot)[0].cells[&Parameter::Temperature], "25.00");

    manager.apply(ViewCommand::SetMachines(Vec::new())).unwrap();
    assert_eq!(feed.open.load(Ordering::SeqCst), 0);
    assert!(manager.series(&machine).is_none());
}
