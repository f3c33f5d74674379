// Per-view store of machine series
use crate::domain::sample::{MachineId, Sample};
use crate::domain::series::Series;
use std::collections::HashMap;

/// One series per active machine. Owned by a single view and mutated only by its manager.
#[derive(Debug, Default)]
pub struct SeriesStore {
    series: HashMap<MachineId, Series>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an empty series. Existing data for the machine is kept.
    pub fn create(&mut self, machine_id: MachineId) {
        self.series.entry(machine_id).or_default();
    }

    /// Replaces the machine's series with an empty one.
    pub fn reset(&mut self, machine_id: MachineId) {
        self.series.insert(machine_id, Series::new());
    }

    pub fn destroy(&mut self, machine_id: &MachineId) -> Option<Series> {
        self.series.remove(machine_id)
    }

    /// Merges then trims. Returns false, and creates nothing, when the machine has no series.
    pub fn merge_into(
        &mut self,
        machine_id: &MachineId,
        samples: Vec<Sample>,
        cutoff_ms: i64,
    ) -> bool {
        match self.series.get_mut(machine_id) {
            Some(series) => {
                *series = series.merge(samples).trim(cutoff_ms);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, machine_id: &MachineId) -> Option<&Series> {
        self.series.get(machine_id)
    }

    pub fn contains(&self, machine_id: &MachineId) -> bool {
        self.series.contains_key(machine_id)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}
