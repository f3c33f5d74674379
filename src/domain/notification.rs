// Threshold notifications and their display bundles
use crate::domain::series::Keyed;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Option<i64>,
    pub plant_id: String,
    pub machine_id: String,
    pub parameter: String,
    pub threshold: String,
    pub timestamp_ms: i64,
    pub severity: Option<String>,
}

/// Event identity: one breach of one parameter on one machine at one instant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NotificationKey {
    pub timestamp_ms: i64,
    pub plant_id: String,
    pub machine_id: String,
    pub parameter: String,
}

impl Keyed for Notification {
    type Key = NotificationKey;

    fn key(&self) -> NotificationKey {
        NotificationKey {
            timestamp_ms: self.timestamp_ms,
            plant_id: self.plant_id.clone(),
            machine_id: self.machine_id.clone(),
            parameter: self.parameter.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdBreach {
    pub parameter: String,
    pub threshold: String,
}

/// All breaches reported for one machine at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationBundle {
    pub id: String,
    pub plant_id: String,
    pub machine_id: String,
    pub timestamp_ms: i64,
    pub severity: Option<String>,
    pub messages: Vec<String>,
    pub breaches: Vec<ThresholdBreach>,
}

/// Groups by `(plant_id, machine_id, timestamp_ms)`, newest bundle first.
pub fn group_bundles(notifications: &[Notification]) -> Vec<NotificationBundle> {
    let mut grouped: BTreeMap<(i64, &str, &str), NotificationBundle> = BTreeMap::new();

    for n in notifications {
        let bundle = grouped
            .entry((n.timestamp_ms, n.plant_id.as_str(), n.machine_id.as_str()))
            .or_insert_with(|| NotificationBundle {
                id: format!("{}-{}-{}", n.plant_id, n.machine_id, n.timestamp_ms),
                plant_id: n.plant_id.clone(),
                machine_id: n.machine_id.clone(),
                timestamp_ms: n.timestamp_ms,
                severity: None,
                messages: Vec::new(),
                breaches: Vec::new(),
            });

        if bundle.severity.is_none() {
            bundle.severity = n.severity.clone();
        }
        bundle
            .messages
            .push(format!("{} exceeded threshold of {}", n.parameter, n.threshold));
        bundle.breaches.push(ThresholdBreach {
            parameter: n.parameter.clone(),
            threshold: n.threshold.clone(),
        });
    }

    grouped.into_values().rev().collect()
}
