// Report service - Failure counts and KPIs for the selected plant
use crate::application::report_source::{FailureRequest, KpiRequest, ReportSource};
use crate::domain::error::ReconcileError;
use crate::domain::failures::{failures_by_day, FailureDay, MachineFailures, MachineKpis};
use crate::domain::sample::{MachineId, PlantId};
use crate::domain::timeframe::ViewMode;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::Arc;

pub fn validate_month(month: u32, year: i32) -> Result<(), ReconcileError> {
    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(_) => Ok(()),
        None => Err(ReconcileError::invalid(format!("no such month {}/{}", month, year))),
    }
}

#[derive(Clone)]
pub struct ReportService {
    source: Arc<dyn ReportSource>,
}

impl ReportService {
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self { source }
    }

    /// One row per day with a failure count for every machine.
    ///
    /// Machines are queried concurrently. Any failed query fails the report.
    pub async fn failures_per_day(
        &self,
        plant_id: &PlantId,
        machines: &[MachineId],
        month: u32,
        year: i32,
    ) -> Result<Vec<FailureDay>> {
        validate_month(month, year)?;

        let requests: Vec<FailureRequest> = machines
            .iter()
            .map(|machine_id| FailureRequest {
                machine_id: machine_id.clone(),
                plant_id: plant_id.clone(),
                month,
                year,
            })
            .collect();

        let replies = futures::future::try_join_all(requests.iter().map(|request| async move {
            self.source
                .fetch_daily_failures(request)
                .await
                .with_context(|| {
                    format!("Failed to load failures for machine {}", request.machine_id)
                })
        }))
        .await?;

        tracing::debug!(
            "Loaded failures for {} machines in {}/{}",
            machines.len(),
            month,
            year
        );
        Ok(failures_by_day(machines, replies))
    }

    /// Totals per machine, ascending by machine.
    pub async fn failures_per_machine(&self, plant_id: &PlantId) -> Result<Vec<MachineFailures>> {
        let mut totals = self
            .source
            .fetch_machine_failures(plant_id)
            .await
            .with_context(|| format!("Failed to load machine failures for plant {}", plant_id))?;
        totals.sort_by(|a, b| a.machine_id.cmp(&b.machine_id));
        Ok(totals)
    }

    /// KPIs over the running totals in real-time mode, or over the range otherwise.
    pub async fn kpis(
        &self,
        machine_id: &MachineId,
        plant_id: &PlantId,
        mode: ViewMode,
    ) -> Result<Option<MachineKpis>> {
        mode.validate()?;
        let range = match mode {
            ViewMode::RealTime { .. } => None,
            ViewMode::Historical { start_ms, end_ms } => Some((start_ms, end_ms)),
        };
        let request = KpiRequest {
            machine_id: machine_id.clone(),
            plant_id: plant_id.clone(),
            range,
        };

        self.source
            .fetch_kpis(&request)
            .await
            .with_context(|| format!("Failed to load KPIs for machine {}", machine_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::failures::DailyFailures;
    use crate::domain::timeframe::Timeframe;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeReports {
        failing: HashSet<String>,
        kpi_requests: Mutex<Vec<KpiRequest>>,
    }

    #[async_trait]
    impl ReportSource for FakeReports {
        async fn fetch_daily_failures(
            &self,
            request: &FailureRequest,
        ) -> Result<Vec<DailyFailures>> {
            if self.failing.contains(request.machine_id.as_str()) {
                anyhow::bail!("backend returned 500");
            }
            // Machine n failed n times on day n
            let n: u32 = request.machine_id.as_str().parse()?;
            Ok(vec![DailyFailures {
                machine_id: request.machine_id.clone(),
                day: n,
                failures: n as u64,
            }])
        }

        async fn fetch_machine_failures(
            &self,
            _plant_id: &PlantId,
        ) -> Result<Vec<MachineFailures>> {
            Ok(vec![
                MachineFailures {
                    machine_id: MachineId::new("2").unwrap(),
                    failures: 4,
                },
                MachineFailures {
                    machine_id: MachineId::new("1").unwrap(),
                    failures: 9,
                },
            ])
        }

        async fn fetch_kpis(&self, request: &KpiRequest) -> Result<Option<MachineKpis>> {
            self.kpi_requests.lock().unwrap().push(request.clone());
            Ok(None)
        }
    }

    fn plant() -> PlantId {
        PlantId::new("1").unwrap()
    }

    fn machines(ids: &[&str]) -> Vec<MachineId> {
        ids.iter().map(|id| MachineId::new(*id).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_failures_per_day_merges_every_machine() {
        let service = ReportService::new(Arc::new(FakeReports::default()));
        let machines = machines(&["1", "2"]);
        let rows = service.failures_per_day(&plant(), &machines, 3, 2024).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].day, 1);
        assert_eq!(rows[0].counts[&machines[0]], 1);
        assert_eq!(rows[0].counts[&machines[1]], 0);
        assert_eq!(rows[1].counts[&machines[1]], 2);
    }

    #[tokio::test]
    async fn test_one_failed_machine_fails_the_report() {
        let source = FakeReports {
            failing: HashSet::from(["2".to_string()]),
            ..FakeReports::default()
        };
        let service = ReportService::new(Arc::new(source));
        let err = service
            .failures_per_day(&plant(), &machines(&["1", "2"]), 3, 2024)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("machine 2"));
    }

    #[tokio::test]
    async fn test_invalid_month_is_rejected_before_fetching() {
        let service = ReportService::new(Arc::new(FakeReports::default()));
        let err = service
            .failures_per_day(&plant(), &machines(&["1"]), 13, 2024)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_machine_totals_are_sorted() {
        let service = ReportService::new(Arc::new(FakeReports::default()));
        let totals = service.failures_per_machine(&plant()).await.unwrap();
        assert_eq!(totals[0].machine_id.as_str(), "1");
        assert_eq!(totals[1].failures, 4);
    }

    #[tokio::test]
    async fn test_kpi_range_follows_view_mode() {
        let source = Arc::new(FakeReports::default());
        let service = ReportService::new(source.clone());
        let machine = MachineId::new("1").unwrap();

        let live = ViewMode::RealTime {
            timeframe: Timeframe::OneHour,
        };
        assert_eq!(service.kpis(&machine, &plant(), live).await.unwrap(), None);
        let past = ViewMode::Historical {
            start_ms: 0,
            end_ms: 60_000,
        };
        service.kpis(&machine, &plant(), past).await.unwrap();

        let requests = source.kpi_requests.lock().unwrap().clone();
        assert_eq!(requests[0].range, None);
        assert_eq!(requests[1].range, Some((0, 60_000)));
    }
}
