// View adapter - Projects snapshots into chart, table, status and notification payloads
use crate::application::status_board::StatusBoard;
use crate::domain::dashboard::ViewSnapshot;
use crate::domain::failures::{FailureDay, MachineFailures, MachineKpis};
use crate::domain::machine_status::MachineStatusEntry;
use crate::domain::notification::NotificationBundle;
use crate::domain::sample::{MachineId, Parameter};
use chrono::DateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Normal operating band per parameter, drawn as min/max overlay lines.
pub const NORMAL_RANGES: [(Parameter, f64, f64); 4] = [
    (Parameter::Temperature, 40.0, 60.0),
    (Parameter::Humidity, 40.0, 50.0),
    (Parameter::PowerSupply, 230.0, 240.0),
    (Parameter::Vibration, 0.2, 0.4),
];

pub const UNAVAILABLE: &str = "Unavailable";

pub fn normal_range(parameter: Parameter) -> Option<(f64, f64)> {
    NORMAL_RANGES
        .iter()
        .find(|(p, _, _)| *p == parameter)
        .map(|(_, min, max)| (*min, *max))
}

pub fn format_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Series,
    NormalMin,
    NormalMax,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time_ms: i64,
    pub time: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartTrace {
    pub name: String,
    pub kind: TraceKind,
    pub machine_id: Option<String>,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub parameter: Parameter,
    pub window_ms: i64,
    pub range_start_ms: i64,
    pub range_end_ms: i64,
    pub traces: Vec<ChartTrace>,
}

/// One trace per machine, followed by the normal-range overlay.
///
/// Overlay lines share the x values of the first machine trace, or span the
/// display range when no machine has data.
pub fn chart_view(snapshot: &ViewSnapshot, parameter: Parameter) -> ChartView {
    let mut traces: Vec<ChartTrace> = snapshot
        .machines
        .iter()
        .map(|panel| ChartTrace {
            name: format!("Machine {}", panel.machine_id),
            kind: TraceKind::Series,
            machine_id: Some(panel.machine_id.to_string()),
            points: panel
                .buckets
                .get(&parameter)
                .map(|buckets| {
                    buckets
                        .iter()
                        .map(|b| ChartPoint {
                            time_ms: b.window_start_ms,
                            time: format_time(b.window_start_ms),
                            value: b.value,
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    if let Some((min, max)) = normal_range(parameter) {
        let xs: Vec<i64> = match traces.iter().find(|t| !t.points.is_empty()) {
            Some(first) => first.points.iter().map(|p| p.time_ms).collect(),
            None => vec![snapshot.range_start_ms, snapshot.range_end_ms],
        };
        let line = |value: f64| -> Vec<ChartPoint> {
            xs.iter()
                .map(|&time_ms| ChartPoint {
                    time_ms,
                    time: format_time(time_ms),
                    value,
                })
                .collect()
        };

        traces.push(ChartTrace {
            name: format!("Normal Range Min - {}", parameter),
            kind: TraceKind::NormalMin,
            machine_id: None,
            points: line(min),
        });
        traces.push(ChartTrace {
            name: format!("Normal Range Max - {}", parameter),
            kind: TraceKind::NormalMax,
            machine_id: None,
            points: line(max),
        });
    }

    ChartView {
        parameter,
        window_ms: snapshot.window_ms,
        range_start_ms: snapshot.range_start_ms,
        range_end_ms: snapshot.range_end_ms,
        traces,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub machine_id: String,
    pub time: String,
    pub cells: BTreeMap<Parameter, String>,
}

/// Latest reading per machine. Missing data renders as `Unavailable`.
pub fn table_rows(snapshot: &ViewSnapshot) -> Vec<TableRow> {
    snapshot
        .machines
        .iter()
        .map(|panel| {
            let latest = panel.latest.as_ref();
            let cells = snapshot
                .parameters
                .iter()
                .map(|&parameter| {
                    let cell = latest
                        .and_then(|s| s.value(parameter))
                        .map(|v| format!("{:.2}", v))
                        .unwrap_or_else(|| UNAVAILABLE.to_string());
                    (parameter, cell)
                })
                .collect();

            TableRow {
                machine_id: panel.machine_id.to_string(),
                time: latest
                    .map(|s| format_time(s.timestamp_ms))
                    .unwrap_or_else(|| UNAVAILABLE.to_string()),
                cells,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSlice {
    pub name: &'static str,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub plant_id: Option<String>,
    pub slices: Vec<StatusSlice>,
    pub machines: Vec<MachineStatusEntry>,
}

pub fn status_view(board: &StatusBoard) -> StatusView {
    let snapshot = &board.snapshot;
    StatusView {
        plant_id: board.plant_id.as_ref().map(ToString::to_string),
        slices: vec![
            StatusSlice {
                name: "Online",
                value: snapshot.online_count,
            },
            StatusSlice {
                name: "Offline",
                value: snapshot.offline_count,
            },
            StatusSlice {
                name: "Unavailable",
                value: snapshot.unavailable_count,
            },
        ],
        machines: snapshot.machines.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationCard {
    pub id: String,
    pub title: String,
    pub time: String,
    pub severity: Option<String>,
    pub messages: Vec<String>,
}

pub fn notification_cards(bundles: &[NotificationBundle]) -> Vec<NotificationCard> {
    bundles
        .iter()
        .map(|bundle| NotificationCard {
            id: bundle.id.clone(),
            title: format!("Plant {} / Machine {}", bundle.plant_id, bundle.machine_id),
            time: format_time(bundle.timestamp_ms),
            severity: bundle.severity.clone(),
            messages: bundle.messages.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub name: String,
    pub machine_id: String,
    pub values: Vec<u64>,
}

/// Grouped bars: `series[i].values[j]` is the count of machine `i` on `days[j]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureChart {
    pub days: Vec<u32>,
    pub series: Vec<BarSeries>,
}

pub fn failure_chart(rows: &[FailureDay], machines: &[MachineId]) -> FailureChart {
    FailureChart {
        days: rows.iter().map(|r| r.day).collect(),
        series: machines
            .iter()
            .map(|machine_id| BarSeries {
                name: format!("Machine {}", machine_id),
                machine_id: machine_id.to_string(),
                values: rows
                    .iter()
                    .map(|r| r.counts.get(machine_id).copied().unwrap_or(0))
                    .collect(),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineFailureBar {
    pub label: String,
    pub failures: u64,
}

pub fn machine_failure_bars(totals: &[MachineFailures]) -> Vec<MachineFailureBar> {
    totals
        .iter()
        .map(|t| MachineFailureBar {
            label: format!("Machine {}", t.machine_id),
            failures: t.failures,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSlice {
    pub name: &'static str,
    pub hours: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiView {
    pub machine_id: String,
    pub uptime: String,
    pub downtime: String,
    pub alerts_triggered: Option<u64>,
    pub failure_rate: String,
    pub slices: Vec<KpiSlice>,
}

/// KPI card and uptime pie. A machine without a KPI record renders as unavailable.
pub fn kpi_view(machine_id: &MachineId, kpis: Option<&MachineKpis>) -> KpiView {
    let Some(kpis) = kpis else {
        return KpiView {
            machine_id: machine_id.to_string(),
            uptime: UNAVAILABLE.to_string(),
            downtime: UNAVAILABLE.to_string(),
            alerts_triggered: None,
            failure_rate: UNAVAILABLE.to_string(),
            slices: Vec::new(),
        };
    };

    let total = kpis.total_minutes();
    let slice = |name: &'static str, minutes: f64| KpiSlice {
        name,
        hours: round2(minutes / 60.0),
        percent: if total > 0.0 { round2(minutes / total * 100.0) } else { 0.0 },
    };

    KpiView {
        machine_id: machine_id.to_string(),
        uptime: clock_duration(kpis.uptime_minutes),
        downtime: clock_duration(kpis.downtime_minutes),
        alerts_triggered: Some(kpis.alerts_triggered),
        failure_rate: format!("{:.2}%", kpis.failure_rate * 100.0),
        slices: vec![
            slice("Uptime", kpis.uptime_minutes),
            slice("Downtime", kpis.downtime_minutes),
        ],
    }
}

/// Minutes as `H:MM:SS`. Negative and non-finite durations read as zero.
fn clock_duration(minutes: f64) -> String {
    let seconds = if minutes.is_finite() && minutes > 0.0 {
        (minutes * 60.0).round() as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", seconds / 3_600, seconds % 3_600 / 60, seconds % 60)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
