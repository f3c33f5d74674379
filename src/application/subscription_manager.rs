// Subscription manager - Owns history fetches and live feeds for one view
use crate::application::clock::Clock;
use crate::application::error_reporter::ErrorReporter;
use crate::application::live_feed::{FeedEvent, FeedHandle, FeedSink, FeedTarget, LiveFeed};
use crate::application::series_store::SeriesStore;
use crate::application::telemetry_source::{HistoryRequest, HistoryWindow, TelemetrySource};
use crate::domain::aggregation::aggregate;
use crate::domain::dashboard::{MachinePanel, MachineState, ViewSelection, ViewSnapshot};
use crate::domain::error::ReconcileError;
use crate::domain::sample::{MachineId, Parameter, PlantId, Sample};
use crate::domain::series::Series;
use crate::domain::timeframe::{aligned_start, window_for_span, AggregationWindow, ViewMode};
use crate::infrastructure::wire;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Collaborators a view needs. Each view gets its own manager, store and feed handles.
#[derive(Clone)]
pub struct ViewDependencies {
    pub source: Arc<dyn TelemetrySource>,
    pub feed: Arc<dyn LiveFeed>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub clock: Arc<dyn Clock>,
}

/// User-driven reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    SetMachines(Vec<MachineId>),
    SetPlant(PlantId),
    SetMode(ViewMode),
    /// Re-enter history loading for machines whose feed gave up.
    Reconnect,
}

/// Completions of asynchronous work, tagged with the generation they were issued under.
#[derive(Debug)]
pub enum ViewEvent {
    HistoryLoaded {
        machine_id: MachineId,
        generation: u64,
        result: Result<Vec<Sample>, String>,
    },
    Feed {
        machine_id: MachineId,
        generation: u64,
        event: FeedEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Superseded by a later reconfiguration.
    Stale,
    /// Malformed frame, dropped without affecting the subscription.
    Dropped,
}

struct ManagedMachine {
    state: MachineState,
    generation: u64,
    feed: Option<FeedHandle>,
}

pub struct SubscriptionManager {
    deps: ViewDependencies,
    plant_id: PlantId,
    mode: ViewMode,
    parameters: Vec<Parameter>,
    focus: Option<Parameter>,
    machines: BTreeMap<MachineId, ManagedMachine>,
    store: SeriesStore,
    next_generation: u64,
    version: u64,
    events_tx: mpsc::UnboundedSender<ViewEvent>,
    events_rx: mpsc::UnboundedReceiver<ViewEvent>,
    snapshot_tx: watch::Sender<ViewSnapshot>,
}

impl SubscriptionManager {
    /// Builds an idle manager. Machines from the selection are added by `start`.
    pub fn new(deps: ViewDependencies, selection: &ViewSelection) -> Result<Self, ReconcileError> {
        selection.mode.validate()?;
        let parameters = if selection.parameters.is_empty() {
            Parameter::ALL.to_vec()
        } else {
            selection.parameters.clone()
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ViewSnapshot::empty(
            selection.plant_id.clone(),
            selection.mode,
            parameters.clone(),
        ));

        Ok(Self {
            deps,
            plant_id: selection.plant_id.clone(),
            mode: selection.mode,
            parameters,
            focus: selection.focus,
            machines: BTreeMap::new(),
            store: SeriesStore::new(),
            next_generation: 0,
            version: 0,
            events_tx,
            events_rx,
            snapshot_tx,
        })
    }

    /// Adds the selection's machines. Must run inside a Tokio runtime.
    pub fn start(&mut self, machines: Vec<MachineId>) {
        self.set_machines(machines);
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn plant_id(&self) -> &PlantId {
        &self.plant_id
    }

    pub fn machine_state(&self, machine_id: &MachineId) -> Option<MachineState> {
        self.machines.get(machine_id).map(|m| m.state)
    }

    pub fn series(&self, machine_id: &MachineId) -> Option<&Series> {
        self.store.get(machine_id)
    }

    pub fn active_machines(&self) -> impl Iterator<Item = &MachineId> {
        self.machines.keys()
    }

    pub fn open_feed_count(&self) -> usize {
        self.machines.values().filter(|m| m.feed.is_some()).count()
    }

    pub fn apply(&mut self, command: ViewCommand) -> Result<(), ReconcileError> {
        match command {
            ViewCommand::SetMachines(machines) => self.set_machines(machines),
            ViewCommand::SetPlant(plant_id) => self.set_plant(plant_id),
            ViewCommand::SetMode(mode) => self.set_mode(mode)?,
            ViewCommand::Reconnect => self.reconnect(),
        }
        Ok(())
    }

    /// Makes `machines` the active set: removed machines are closed, new ones start loading.
    pub fn set_machines(&mut self, machines: Vec<MachineId>) {
        let wanted: BTreeSet<MachineId> = machines.into_iter().collect();
        let removed: Vec<MachineId> = self
            .machines
            .keys()
            .filter(|id| !wanted.contains(*id))
            .cloned()
            .collect();

        for machine_id in &removed {
            self.close_machine(machine_id);
        }

        for machine_id in wanted {
            if self.machines.contains_key(&machine_id) {
                continue;
            }
            self.store.create(machine_id.clone());
            self.machines.insert(
                machine_id.clone(),
                ManagedMachine {
                    state: MachineState::Idle,
                    generation: 0,
                    feed: None,
                },
            );
            self.begin_fetch(&machine_id);
        }

        self.publish();
    }

    /// Machine ids are plant-scoped, so every series restarts from empty.
    pub fn set_plant(&mut self, plant_id: PlantId) {
        if plant_id == self.plant_id {
            return;
        }
        tracing::info!("Switching view from plant {} to {}", self.plant_id, plant_id);
        self.plant_id = plant_id;

        let machines: Vec<MachineId> = self.machines.keys().cloned().collect();
        for machine_id in &machines {
            self.store.reset(machine_id.clone());
            self.begin_fetch(machine_id);
        }
        self.publish();
    }

    /// Switches timeframe, range, or real-time/historical mode.
    ///
    /// Series are kept; every machine reloads history under the new mode, which
    /// closes all feeds first. Feeds reopen only once history lands in real-time mode.
    pub fn set_mode(&mut self, mode: ViewMode) -> Result<(), ReconcileError> {
        mode.validate()?;
        if mode == self.mode {
            return Ok(());
        }
        tracing::info!("Switching view mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;

        let machines: Vec<MachineId> = self.machines.keys().cloned().collect();
        for machine_id in &machines {
            self.begin_fetch(machine_id);
        }
        self.publish();
        Ok(())
    }

    pub fn reconnect(&mut self) {
        let idle: Vec<MachineId> = self
            .machines
            .iter()
            .filter(|(_, m)| m.state == MachineState::Idle)
            .map(|(id, _)| id.clone())
            .collect();
        for machine_id in &idle {
            self.begin_fetch(machine_id);
        }
        if !idle.is_empty() {
            self.publish();
        }
    }

    /// Closes every feed and destroys every series.
    pub fn teardown(&mut self) {
        let machines: Vec<MachineId> = self.machines.keys().cloned().collect();
        for machine_id in &machines {
            self.close_machine(machine_id);
        }
        self.store.clear();
        self.publish();
    }

    pub fn handle_event(&mut self, event: ViewEvent) -> EventOutcome {
        match event {
            ViewEvent::HistoryLoaded {
                machine_id,
                generation,
                result,
            } => self.apply_history(machine_id, generation, result),
            ViewEvent::Feed {
                machine_id,
                generation,
                event,
            } => self.apply_feed_event(machine_id, generation, event),
        }
    }

    /// Waits for and applies the next fetch completion or feed event.
    pub async fn next_event(&mut self) -> Option<EventOutcome> {
        let event = self.events_rx.recv().await?;
        Some(self.handle_event(event))
    }

    /// Runs until the command channel closes, then tears the view down.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ViewCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.apply(command) {
                            self.deps.reporter.report(&e);
                        }
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }
        tracing::info!("View for plant {} shutting down", self.plant_id);
        self.teardown();
    }

    fn apply_history(
        &mut self,
        machine_id: MachineId,
        generation: u64,
        result: Result<Vec<Sample>, String>,
    ) -> EventOutcome {
        if !self.is_current(&machine_id, generation) {
            self.log_stale(machine_id, generation);
            return EventOutcome::Stale;
        }

        match result {
            Ok(samples) => {
                tracing::debug!(
                    "Loaded {} history samples for machine {}",
                    samples.len(),
                    machine_id
                );
                let cutoff = self.display_range().0;
                self.store.merge_into(&machine_id, samples, cutoff);
            }
            Err(reason) => {
                // Fail open: the machine goes live with whatever it already has
                self.deps.reporter.report(&ReconcileError::FetchFailure {
                    machine: machine_id.clone(),
                    reason,
                });
            }
        }

        self.go_live(&machine_id, generation);
        self.publish();
        EventOutcome::Applied
    }

    fn apply_feed_event(
        &mut self,
        machine_id: MachineId,
        generation: u64,
        event: FeedEvent,
    ) -> EventOutcome {
        let subscribed = self
            .machines
            .get(&machine_id)
            .is_some_and(|m| m.generation == generation && m.feed.is_some());
        if !subscribed {
            self.log_stale(machine_id, generation);
            return EventOutcome::Stale;
        }

        match event {
            FeedEvent::Frame(frame) => self.apply_frame(&machine_id, &frame),
            FeedEvent::Reconnecting { attempt, reason } => {
                self.deps.reporter.report(&ReconcileError::TransportClosed {
                    feed: self.telemetry_target(&machine_id).to_string(),
                    reason: format!("{} (reconnect attempt {})", reason, attempt),
                    retrying: true,
                });
                EventOutcome::Applied
            }
            FeedEvent::Closed { reason } => {
                self.deps.reporter.report(&ReconcileError::TransportClosed {
                    feed: self.telemetry_target(&machine_id).to_string(),
                    reason,
                    retrying: false,
                });
                if let Some(managed) = self.machines.get_mut(&machine_id) {
                    managed.feed = None;
                    managed.state = MachineState::Idle;
                }
                self.publish();
                EventOutcome::Applied
            }
        }
    }

    fn apply_frame(&mut self, machine_id: &MachineId, frame: &str) -> EventOutcome {
        let readings = match wire::decode_telemetry_frame(frame) {
            Ok(readings) => readings,
            Err(e) => {
                self.deps.reporter.report(&e);
                return EventOutcome::Dropped;
            }
        };

        let samples: Vec<Sample> = readings
            .into_iter()
            .filter(|r| {
                &r.sample.machine_id == machine_id && r.plant_id.as_ref() == Some(&self.plant_id)
            })
            .map(|r| r.sample)
            .collect();

        if !samples.is_empty() {
            let cutoff = self.display_range().0;
            self.store.merge_into(machine_id, samples, cutoff);
            self.publish();
        }
        EventOutcome::Applied
    }

    fn is_current(&self, machine_id: &MachineId, generation: u64) -> bool {
        self.machines
            .get(machine_id)
            .is_some_and(|m| m.generation == generation)
    }

    fn log_stale(&self, machine_id: MachineId, generation: u64) {
        let stale = ReconcileError::StaleResult {
            machine: machine_id,
            generation,
        };
        tracing::debug!("Discarding {}", stale);
    }

    /// Invalidates outstanding work for the machine and starts a fresh history load.
    fn begin_fetch(&mut self, machine_id: &MachineId) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let request = self.history_request(machine_id);

        let Some(managed) = self.machines.get_mut(machine_id) else {
            return;
        };
        managed.feed = None;
        managed.generation = generation;
        managed.state = MachineState::FetchingHistory;

        let source = self.deps.source.clone();
        let tx = self.events_tx.clone();
        let machine_id = machine_id.clone();
        tokio::spawn(async move {
            let result = source
                .fetch_history(&request)
                .await
                .map_err(|e| format!("{:#}", e));
            // The manager may already be gone
            let _ = tx.send(ViewEvent::HistoryLoaded {
                machine_id,
                generation,
                result,
            });
        });
    }

    fn go_live(&mut self, machine_id: &MachineId, generation: u64) {
        let feed = if self.mode.is_real_time() {
            let target = self.telemetry_target(machine_id);
            let sink = self.feed_sink(machine_id.clone(), generation);
            tracing::info!("Opening {}", target);
            Some(self.deps.feed.open(target, sink))
        } else {
            None
        };

        if let Some(managed) = self.machines.get_mut(machine_id) {
            managed.state = MachineState::Live;
            managed.feed = feed;
        }
    }

    fn close_machine(&mut self, machine_id: &MachineId) {
        if let Some(mut managed) = self.machines.remove(machine_id) {
            if let Some(feed) = managed.feed.take() {
                feed.close();
            }
            managed.state = MachineState::Closed;
            tracing::info!("Machine {} closed", machine_id);
        }
        self.store.destroy(machine_id);
    }

    fn feed_sink(&self, machine_id: MachineId, generation: u64) -> FeedSink {
        let tx = self.events_tx.clone();
        FeedSink::new(move |event| {
            tx.send(ViewEvent::Feed {
                machine_id: machine_id.clone(),
                generation,
                event,
            })
            .is_ok()
        })
    }

    fn telemetry_target(&self, machine_id: &MachineId) -> FeedTarget {
        FeedTarget::Telemetry {
            machine_id: machine_id.clone(),
            plant_id: self.plant_id.clone(),
        }
    }

    fn history_request(&self, machine_id: &MachineId) -> HistoryRequest {
        let window = match (self.mode, self.focus) {
            (ViewMode::RealTime { timeframe }, _) => HistoryWindow::Trailing(timeframe),
            (ViewMode::Historical { start_ms, end_ms }, Some(parameter)) => {
                HistoryWindow::ParameterRange {
                    start_ms,
                    end_ms,
                    parameter,
                }
            }
            (ViewMode::Historical { start_ms, end_ms }, None) => {
                HistoryWindow::Range { start_ms, end_ms }
            }
        };
        HistoryRequest {
            machine_id: machine_id.clone(),
            plant_id: self.plant_id.clone(),
            window,
        }
    }

    /// `(start, end, window)` the view renders. The start doubles as the retention cutoff.
    fn display_range(&self) -> (i64, i64, AggregationWindow) {
        match self.mode {
            ViewMode::RealTime { timeframe } => {
                let now = self.deps.clock.now_ms();
                let window = timeframe.aggregation_window();
                let start = aligned_start(now.saturating_sub(timeframe.duration_ms()), window);
                (start, now, window)
            }
            ViewMode::Historical { start_ms, end_ms } => {
                (start_ms, end_ms, window_for_span(end_ms.saturating_sub(start_ms)))
            }
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        let (range_start_ms, range_end_ms, window) = self.display_range();

        let machines = self
            .machines
            .iter()
            .map(|(machine_id, managed)| {
                let series = self.store.get(machine_id);
                let buckets = self
                    .parameters
                    .iter()
                    .map(|&parameter| {
                        let buckets = series
                            .map(|s| aggregate(s, parameter, window, range_start_ms, range_end_ms))
                            .unwrap_or_default();
                        (parameter, buckets)
                    })
                    .collect();

                MachinePanel {
                    machine_id: machine_id.clone(),
                    state: managed.state,
                    sample_count: series.map(Series::len).unwrap_or(0),
                    latest: series.and_then(|s| s.latest().cloned()),
                    buckets,
                }
            })
            .collect();

        self.snapshot_tx.send_replace(ViewSnapshot {
            version: self.version,
            plant_id: self.plant_id.clone(),
            mode: self.mode,
            range_start_ms,
            range_end_ms,
            window_ms: window.as_millis(),
            parameters: self.parameters.clone(),
            machines,
        });
    }
}
