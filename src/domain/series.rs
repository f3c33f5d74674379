// Deduplicated, time-ordered series and the keyed merge primitive
use crate::domain::sample::Sample;
use std::collections::BTreeMap;

/// A record with a stable identity. Key ordering is the storage order.
pub trait Keyed {
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
}

/// Union of `existing` and `incoming` by key, sorted by key.
///
/// Records from `incoming` replace records from `existing` with the same key.
/// Within `incoming` the last record for a key wins, so applying the same batch
/// twice gives the same result as applying it once.
pub fn merge_keyed<T>(existing: &[T], incoming: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Keyed + Clone,
{
    let mut merged: BTreeMap<T::Key, T> = existing
        .iter()
        .map(|record| (record.key(), record.clone()))
        .collect();

    for record in incoming {
        merged.insert(record.key(), record);
    }

    merged.into_values().collect()
}

/// Samples keyed by `(timestamp_ms, machine_id)`, ascending by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new series; `self` is left untouched and callers swap their reference.
    pub fn merge(&self, incoming: impl IntoIterator<Item = Sample>) -> Series {
        Series {
            samples: merge_keyed(&self.samples, incoming),
        }
    }

    /// Drops every sample older than `cutoff_ms`.
    pub fn trim(&self, cutoff_ms: i64) -> Series {
        let start = self.samples.partition_point(|s| s.timestamp_ms < cutoff_ms);
        Series {
            samples: self.samples[start..].to_vec(),
        }
    }

    /// Samples with `start_ms <= timestamp_ms <= end_ms`.
    pub fn range(&self, start_ms: i64, end_ms: i64) -> &[Sample] {
        if end_ms < start_ms {
            return &[];
        }
        let lo = self.samples.partition_point(|s| s.timestamp_ms < start_ms);
        let hi = self.samples.partition_point(|s| s.timestamp_ms <= end_ms);
        &self.samples[lo..hi]
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
