// Dashboard view domain model
use crate::domain::aggregation::Bucket;
use crate::domain::sample::{MachineId, Parameter, PlantId, Sample};
use crate::domain::timeframe::ViewMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of one machine inside a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    Idle,
    FetchingHistory,
    Live,
    Closed,
}

/// What the user selected for a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSelection {
    pub plant_id: PlantId,
    pub machines: Vec<MachineId>,
    pub mode: ViewMode,
    pub parameters: Vec<Parameter>,
    /// Single-parameter views fetch only that field in historical mode.
    pub focus: Option<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachinePanel {
    pub machine_id: MachineId,
    pub state: MachineState,
    pub sample_count: usize,
    pub latest: Option<Sample>,
    pub buckets: BTreeMap<Parameter, Vec<Bucket>>,
}

/// Everything a sink needs to render one view, republished after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub version: u64,
    pub plant_id: PlantId,
    pub mode: ViewMode,
    pub range_start_ms: i64,
    pub range_end_ms: i64,
    pub window_ms: i64,
    pub parameters: Vec<Parameter>,
    pub machines: Vec<MachinePanel>,
}

impl ViewSnapshot {
    pub fn empty(plant_id: PlantId, mode: ViewMode, parameters: Vec<Parameter>) -> Self {
        Self {
            version: 0,
            plant_id,
            mode,
            range_start_ms: 0,
            range_end_ms: 0,
            window_ms: 0,
            parameters,
            machines: Vec::new(),
        }
    }

    pub fn panel(&self, machine_id: &MachineId) -> Option<&MachinePanel> {
        self.machines.iter().find(|p| &p.machine_id == machine_id)
    }
}
