// Failure counts and machine KPIs for the reporting panels
use crate::domain::sample::MachineId;
use crate::domain::series::{merge_keyed, Keyed};
use serde::Serialize;
use std::collections::BTreeMap;

/// Failures one machine had on one day of the requested month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyFailures {
    pub machine_id: MachineId,
    pub day: u32,
    pub failures: u64,
}

impl Keyed for DailyFailures {
    type Key = (u32, MachineId);

    fn key(&self) -> Self::Key {
        (self.day, self.machine_id.clone())
    }
}

/// One row of the per-day chart: every requested machine has a count, zero when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDay {
    pub day: u32,
    pub counts: BTreeMap<MachineId, u64>,
}

/// Folds per-machine replies into one row per day.
///
/// Replies are merged on `(day, machine)`, so a machine answering twice keeps
/// its latest count. Days come out ascending.
pub fn failures_by_day(
    machines: &[MachineId],
    replies: impl IntoIterator<Item = Vec<DailyFailures>>,
) -> Vec<FailureDay> {
    let mut merged: Vec<DailyFailures> = Vec::new();
    for reply in replies {
        merged = merge_keyed(&merged, reply);
    }

    let mut days: BTreeMap<u32, BTreeMap<MachineId, u64>> = BTreeMap::new();
    for record in merged {
        let counts = days.entry(record.day).or_insert_with(|| {
            machines.iter().map(|m| (m.clone(), 0)).collect()
        });
        counts.insert(record.machine_id, record.failures);
    }

    days.into_iter()
        .map(|(day, counts)| FailureDay { day, counts })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineFailures {
    pub machine_id: MachineId,
    pub failures: u64,
}

/// Availability figures for one machine. Durations are minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MachineKpis {
    pub uptime_minutes: f64,
    pub downtime_minutes: f64,
    pub alerts_triggered: u64,
    /// Alerts per minute of observed time
    pub failure_rate: f64,
}

impl MachineKpis {
    pub fn total_minutes(&self) -> f64 {
        self.uptime_minutes + self.downtime_minutes
    }

    /// Uptime as a percentage of observed time, `None` before anything was observed.
    pub fn uptime_percent(&self) -> Option<f64> {
        let total = self.total_minutes();
        (total > 0.0).then(|| self.uptime_minutes / total * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(id: &str) -> MachineId {
        MachineId::new(id).unwrap()
    }

    fn daily(id: &str, day: u32, failures: u64) -> DailyFailures {
        DailyFailures {
            machine_id: machine(id),
            day,
            failures,
        }
    }

    #[test]
    fn test_days_merge_across_machines_with_zero_fill() {
        let machines = vec![machine("1"), machine("2")];
        let rows = failures_by_day(
            &machines,
            vec![
                vec![daily("1", 3, 2), daily("1", 1, 1)],
                vec![daily("2", 3, 5)],
            ],
        );

        assert_eq!(rows.iter().map(|r| r.day).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(rows[0].counts[&machine("1")], 1);
        assert_eq!(rows[0].counts[&machine("2")], 0);
        assert_eq!(rows[1].counts[&machine("1")], 2);
        assert_eq!(rows[1].counts[&machine("2")], 5);
    }

    #[test]
    fn test_repeated_reply_keeps_latest_count() {
        let machines = vec![machine("1")];
        let rows = failures_by_day(&machines, vec![vec![daily("1", 7, 1)], vec![daily("1", 7, 4)]]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counts[&machine("1")], 4);
    }

    #[test]
    fn test_no_replies_no_days() {
        assert!(failures_by_day(&[machine("1")], Vec::<Vec<DailyFailures>>::new()).is_empty());
    }

    #[test]
    fn test_uptime_percent() {
        let kpis = MachineKpis {
            uptime_minutes: 90.0,
            downtime_minutes: 30.0,
            alerts_triggered: 3,
            failure_rate: 0.025,
        };
        assert_eq!(kpis.uptime_percent(), Some(75.0));

        let idle = MachineKpis {
            uptime_minutes: 0.0,
            downtime_minutes: 0.0,
            alerts_triggered: 0,
            failure_rate: 0.0,
        };
        assert_eq!(idle.uptime_percent(), None);
    }
}
