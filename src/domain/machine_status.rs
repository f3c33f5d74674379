// Machine availability as reported by the status stream
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Offline,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineStatusEntry {
    pub machine_id: String,
    pub status: MachineStatus,
}

/// One status frame. Each frame replaces the previous one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub online_count: u32,
    pub offline_count: u32,
    pub unavailable_count: u32,
    pub machines: Vec<MachineStatusEntry>,
}
