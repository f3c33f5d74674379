// Backend JSON shapes and their conversion into domain types
use crate::domain::error::ReconcileError;
use crate::domain::failures::{DailyFailures, MachineFailures, MachineKpis};
use crate::domain::machine_status::{MachineStatus, MachineStatusEntry, StatusSnapshot};
use crate::domain::notification::Notification;
use crate::domain::sample::{MachineId, Parameter, PlantId, Sample};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

/// Ids arrive as numbers from the data stream and as strings from some REST endpoints.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Number(n) => n.to_string(),
            WireId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct TelemetryRow {
    machine_id: WireId,
    #[serde(default)]
    plant_id: Option<WireId>,
    time: WireTime,
    #[serde(default)]
    temperature: Option<Value>,
    #[serde(default)]
    humidity: Option<Value>,
    #[serde(default)]
    vibration: Option<Value>,
    #[serde(default)]
    power_supply: Option<Value>,
}

/// A decoded data-stream row, before filtering by the view's plant.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveReading {
    pub plant_id: Option<PlantId>,
    pub sample: Sample,
}

impl TelemetryRow {
    pub fn into_reading(self) -> Result<LiveReading, String> {
        let machine_id = MachineId::new(self.machine_id.into_string()).map_err(|e| e.to_string())?;
        let plant_id = match self.plant_id {
            Some(id) => Some(PlantId::new(id.into_string()).map_err(|e| e.to_string())?),
            None => None,
        };
        let timestamp_ms = parse_time(&self.time)
            .ok_or_else(|| format!("unparseable time {:?}", self.time))?;

        let mut sample = Sample::new(machine_id, timestamp_ms);
        for (parameter, raw) in [
            (Parameter::Temperature, self.temperature),
            (Parameter::Humidity, self.humidity),
            (Parameter::Vibration, self.vibration),
            (Parameter::PowerSupply, self.power_supply),
        ] {
            // "Unavailable", null and missing fields all mean no reading
            if let Some(value) = raw.as_ref().and_then(Value::as_f64) {
                sample = sample.with(parameter, value);
            }
        }

        Ok(LiveReading { plant_id, sample })
    }
}

/// Converts a history response, skipping rows that cannot be read.
pub fn rows_into_samples(rows: Vec<TelemetryRow>) -> Vec<Sample> {
    rows.into_iter()
        .filter_map(|row| match row.into_reading() {
            Ok(reading) => Some(reading.sample),
            Err(reason) => {
                tracing::warn!("Skipping history row: {}", reason);
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Decodes one `data-stream` text frame. A single bad row rejects the whole frame.
pub fn decode_telemetry_frame(frame: &str) -> Result<Vec<LiveReading>, ReconcileError> {
    let rows = match serde_json::from_str::<OneOrMany<TelemetryRow>>(frame)
        .map_err(|e| ReconcileError::malformed("data-stream", e))?
    {
        OneOrMany::Many(rows) => rows,
        OneOrMany::One(row) => vec![row],
    };

    rows.into_iter()
        .map(|row| {
            row.into_reading()
                .map_err(|reason| ReconcileError::malformed("data-stream", reason))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct StatusFrame {
    #[serde(default)]
    online_count: u32,
    #[serde(default)]
    offline_count: u32,
    #[serde(default)]
    unavailable_count: u32,
    #[serde(default)]
    machines: Vec<StatusRow>,
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    machine_id: WireId,
    status: MachineStatus,
}

pub fn decode_status_frame(frame: &str) -> Result<StatusSnapshot, ReconcileError> {
    let parsed: StatusFrame =
        serde_json::from_str(frame).map_err(|e| ReconcileError::malformed("machine-status", e))?;

    Ok(StatusSnapshot {
        online_count: parsed.online_count,
        offline_count: parsed.offline_count,
        unavailable_count: parsed.unavailable_count,
        machines: parsed
            .machines
            .into_iter()
            .map(|row| MachineStatusEntry {
                machine_id: row.machine_id.into_string(),
                status: row.status,
            })
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct NotificationRow {
    #[serde(default)]
    id: Option<i64>,
    plant_id: WireId,
    machine_id: WireId,
    parameter: String,
    threshold: Value,
    timestamp: WireTime,
    #[serde(default)]
    severity: Option<String>,
}

impl NotificationRow {
    pub fn into_notification(self) -> Result<Notification, String> {
        let timestamp_ms = parse_time(&self.timestamp)
            .ok_or_else(|| format!("unparseable timestamp {:?}", self.timestamp))?;
        let threshold = match self.threshold {
            Value::String(s) => s,
            other => other.to_string(),
        };

        Ok(Notification {
            id: self.id,
            plant_id: self.plant_id.into_string(),
            machine_id: self.machine_id.into_string(),
            parameter: self.parameter,
            threshold,
            timestamp_ms,
            severity: self.severity,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NotificationFrame {
    notification: NotificationRow,
}

pub fn decode_notification_frame(frame: &str) -> Result<Notification, ReconcileError> {
    let parsed: NotificationFrame = serde_json::from_str(frame)
        .map_err(|e| ReconcileError::malformed("notification-stream", e))?;
    parsed
        .notification
        .into_notification()
        .map_err(|reason| ReconcileError::malformed("notification-stream", reason))
}

/// One `/api/num-failures` entry. The reply does not repeat the machine.
#[derive(Debug, Deserialize)]
pub struct DailyFailureRow {
    day: Value,
    failures: Value,
}

impl DailyFailureRow {
    pub fn into_daily(self, machine_id: &MachineId) -> Result<DailyFailures, String> {
        let day = whole_number(&self.day)
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| (1..=31).contains(d))
            .ok_or_else(|| format!("bad day {}", self.day))?;
        let failures = whole_number(&self.failures)
            .ok_or_else(|| format!("bad count {}", self.failures))?;
        Ok(DailyFailures {
            machine_id: machine_id.clone(),
            day,
            failures,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MachineFailureRow {
    machine_id: WireId,
    failures: Value,
}

impl MachineFailureRow {
    pub fn into_machine_failures(self) -> Result<MachineFailures, String> {
        let machine_id = MachineId::new(self.machine_id.into_string()).map_err(|e| e.to_string())?;
        let failures = whole_number(&self.failures)
            .ok_or_else(|| format!("bad count {}", self.failures))?;
        Ok(MachineFailures { machine_id, failures })
    }
}

/// `/api/machine-kpis` row. Uptime and downtime are minutes.
#[derive(Debug, Deserialize)]
pub struct KpiRow {
    #[serde(default)]
    uptime: Option<f64>,
    #[serde(default)]
    downtime: Option<f64>,
    #[serde(default)]
    num_alerts_triggered: Option<Value>,
    #[serde(default)]
    failure_rate: Option<f64>,
}

impl From<KpiRow> for MachineKpis {
    fn from(row: KpiRow) -> Self {
        MachineKpis {
            uptime_minutes: row.uptime.unwrap_or(0.0),
            downtime_minutes: row.downtime.unwrap_or(0.0),
            alerts_triggered: row.num_alerts_triggered.as_ref().and_then(whole_number).unwrap_or(0),
            failure_rate: row.failure_rate.unwrap_or(0.0),
        }
    }
}

/// Counts come back as integers, or as floats from SQL aggregates.
fn whole_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

/// Epoch milliseconds, RFC 3339, or naive ISO read as UTC.
fn parse_time(raw: &WireTime) -> Option<i64> {
    match raw {
        WireTime::Millis(ms) => Some(*ms),
        WireTime::Fractional(ms) if ms.is_finite() => Some(ms.round() as i64),
        WireTime::Fractional(_) => None,
        WireTime::Text(text) => parse_time_text(text.trim()),
    }
}

fn parse_time_text(text: &str) -> Option<i64> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(text, format) {
            return Some(time.and_utc().timestamp_millis());
        }
    }
    text.parse::<i64>().ok()
}
