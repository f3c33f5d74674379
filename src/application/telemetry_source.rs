// Source trait for historical telemetry
use crate::domain::notification::Notification;
use crate::domain::sample::{MachineId, Parameter, PlantId, Sample};
use crate::domain::timeframe::Timeframe;
use async_trait::async_trait;

/// Which slice of history to load for one machine.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryWindow {
    Trailing(Timeframe),
    Range { start_ms: i64, end_ms: i64 },
    ParameterRange {
        start_ms: i64,
        end_ms: i64,
        parameter: Parameter,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub machine_id: MachineId,
    pub plant_id: PlantId,
    pub window: HistoryWindow,
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Samples for one machine, in any order, possibly with duplicates
    async fn fetch_history(&self, request: &HistoryRequest) -> anyhow::Result<Vec<Sample>>;

    /// Notifications already raised before the stream was opened
    async fn fetch_notifications(&self) -> anyhow::Result<Vec<Notification>>;
}
