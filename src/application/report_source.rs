// Source trait for failure counts and machine KPIs
use crate::domain::failures::{DailyFailures, MachineFailures, MachineKpis};
use crate::domain::sample::{MachineId, PlantId};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct FailureRequest {
    pub machine_id: MachineId,
    pub plant_id: PlantId,
    /// 1-based calendar month
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiRequest {
    pub machine_id: MachineId,
    pub plant_id: PlantId,
    /// Explicit range for historical views; the running totals otherwise.
    pub range: Option<(i64, i64)>,
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Per-day failure counts of one machine for one month
    async fn fetch_daily_failures(
        &self,
        request: &FailureRequest,
    ) -> anyhow::Result<Vec<DailyFailures>>;

    async fn fetch_machine_failures(
        &self,
        plant_id: &PlantId,
    ) -> anyhow::Result<Vec<MachineFailures>>;

    /// `None` when the backend has no KPI record for the machine yet
    async fn fetch_kpis(&self, request: &KpiRequest) -> anyhow::Result<Option<MachineKpis>>;
}
