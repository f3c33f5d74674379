// Backend REST client
use crate::application::report_source::{FailureRequest, KpiRequest, ReportSource};
use crate::application::telemetry_source::{HistoryRequest, HistoryWindow, TelemetrySource};
use crate::domain::failures::{DailyFailures, MachineFailures, MachineKpis};
use crate::domain::notification::Notification;
use crate::domain::sample::{PlantId, Sample};
use crate::infrastructure::wire::{
    rows_into_samples, DailyFailureRow, KpiRow, MachineFailureRow, NotificationRow, TelemetryRow,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

type Query = Vec<(&'static str, String)>;

/// Path and query parameters for one history request.
pub fn history_query(request: &HistoryRequest) -> Result<(&'static str, Query)> {
    let mut params = vec![
        ("machineId", request.machine_id.to_string()),
        ("plantId", request.plant_id.to_string()),
    ];

    let path = match &request.window {
        HistoryWindow::Trailing(timeframe) => {
            params.push(("timeframe", timeframe.as_str().to_string()));
            "/historical-data"
        }
        HistoryWindow::Range { start_ms, end_ms } => {
            params.push(("startTime", iso_millis(*start_ms)?));
            params.push(("endTime", iso_millis(*end_ms)?));
            "/historical-data-start-end"
        }
        HistoryWindow::ParameterRange {
            start_ms,
            end_ms,
            parameter,
        } => {
            params.push(("startTime", iso_millis(*start_ms)?));
            params.push(("endTime", iso_millis(*end_ms)?));
            params.push(("param", parameter.as_str().to_string()));
            "/historical-data-start-end-param"
        }
    };

    Ok((path, params))
}

pub fn failure_query(request: &FailureRequest) -> Query {
    vec![
        ("month", request.month.to_string()),
        ("year", request.year.to_string()),
        ("machine_id", request.machine_id.to_string()),
        ("plant_id", request.plant_id.to_string()),
    ]
}

pub fn kpi_query(request: &KpiRequest) -> Result<(&'static str, Query)> {
    let mut params = vec![
        ("machine_id", request.machine_id.to_string()),
        ("plant_id", request.plant_id.to_string()),
    ];
    match request.range {
        None => Ok(("/api/machine-kpis", params)),
        Some((start_ms, end_ms)) => {
            params.push(("startTime", iso_millis(start_ms)?));
            params.push(("endTime", iso_millis(end_ms)?));
            Ok(("/api/machine-kpis-not-realtime", params))
        }
    }
}

fn iso_millis(ms: i64) -> Result<String> {
    let time = DateTime::from_timestamp_millis(ms)
        .with_context(|| format!("timestamp {} out of range", ms))?;
    Ok(time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl BackendClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(params)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed with status {}: {}", path, status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

#[async_trait]
impl TelemetrySource for BackendClient {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<Sample>> {
        let (path, params) = history_query(request)?;
        tracing::debug!("Fetching {} for machine {}", path, request.machine_id);

        let rows: Vec<TelemetryRow> = self.get_json(path, &params).await?;
        Ok(rows_into_samples(rows))
    }

    async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = self.get_json("/api/notifications", &[]).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_notification() {
                Ok(notification) => Some(notification),
                Err(reason) => {
                    tracing::warn!("Skipping notification: {}", reason);
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl ReportSource for BackendClient {
    async fn fetch_daily_failures(&self, request: &FailureRequest) -> Result<Vec<DailyFailures>> {
        let rows: Vec<DailyFailureRow> =
            self.get_json("/api/num-failures", &failure_query(request)).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_daily(&request.machine_id) {
                Ok(daily) => Some(daily),
                Err(reason) => {
                    tracing::warn!("Skipping failure row for {}: {}", request.machine_id, reason);
                    None
                }
            })
            .collect())
    }

    async fn fetch_machine_failures(&self, plant_id: &PlantId) -> Result<Vec<MachineFailures>> {
        let params = [("plant_id", plant_id.to_string())];
        let rows: Vec<MachineFailureRow> =
            self.get_json("/api/num-machine-failures", &params).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_machine_failures() {
                Ok(totals) => Some(totals),
                Err(reason) => {
                    tracing::warn!("Skipping machine failure row: {}", reason);
                    None
                }
            })
            .collect())
    }

    async fn fetch_kpis(&self, request: &KpiRequest) -> Result<Option<MachineKpis>> {
        let (path, params) = kpi_query(request)?;
        let rows: Vec<KpiRow> = self.get_json(path, &params).await?;
        Ok(rows.into_iter().next().map(MachineKpis::from))
    }
}
