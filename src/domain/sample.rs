// Telemetry sample domain model
use crate::domain::error::ReconcileError;
use crate::domain::series::Keyed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Machine identifier as the backend reports it (numeric ids are kept in their decimal form).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Result<Self, ReconcileError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ReconcileError::invalid("machine id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MachineId {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MachineId> for String {
    fn from(id: MachineId) -> Self {
        id.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlantId(String);

impl PlantId {
    pub fn new(id: impl Into<String>) -> Result<Self, ReconcileError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ReconcileError::invalid("plant id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlantId {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlantId> for String {
    fn from(id: PlantId) -> Self {
        id.0
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Humidity,
    Vibration,
    PowerSupply,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Temperature,
        Parameter::Humidity,
        Parameter::Vibration,
        Parameter::PowerSupply,
    ];

    /// Field name used by the backend wire format.
    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Humidity => "humidity",
            Parameter::Vibration => "vibration",
            Parameter::PowerSupply => "power_supply",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| ReconcileError::invalid(format!("unknown parameter '{}'", s)))
    }
}

/// Identity of a sample. Field order makes the derived ordering time-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey {
    pub timestamp_ms: i64,
    pub machine_id: MachineId,
}

/// One telemetry reading for one machine at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub machine_id: MachineId,
    pub timestamp_ms: i64,
    pub readings: BTreeMap<Parameter, f64>,
}

impl Sample {
    pub fn new(machine_id: MachineId, timestamp_ms: i64) -> Self {
        Self {
            machine_id,
            timestamp_ms,
            readings: BTreeMap::new(),
        }
    }

    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        self.readings.insert(parameter, value);
        self
    }

    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.readings.get(&parameter).copied()
    }
}

impl Keyed for Sample {
    type Key = SampleKey;

    fn key(&self) -> SampleKey {
        SampleKey {
            timestamp_ms: self.timestamp_ms,
            machine_id: self.machine_id.clone(),
        }
    }
}
