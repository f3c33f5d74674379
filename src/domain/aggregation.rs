// Windowed averaging of a series into display buckets
use crate::domain::sample::Parameter;
use crate::domain::series::Series;
use crate::domain::timeframe::AggregationWindow;
use serde::Serialize;

/// Mean of one window. Windows without samples are never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub window_start_ms: i64,
    pub value: f64,
}

/// Averages `parameter` over consecutive windows starting at `range_start_ms`.
///
/// Only samples inside `[range_start_ms, range_end_ms]` that carry `parameter`
/// contribute. Output is ascending by window start.
pub fn aggregate(
    series: &Series,
    parameter: Parameter,
    window: AggregationWindow,
    range_start_ms: i64,
    range_end_ms: i64,
) -> Vec<Bucket> {
    let width = window.as_millis();
    let mut buckets = Vec::new();
    // (window index, sum, count)
    let mut open: Option<(i64, f64, u32)> = None;

    for sample in series.range(range_start_ms, range_end_ms) {
        let Some(value) = sample.value(parameter) else {
            continue;
        };
        let index = sample.timestamp_ms.saturating_sub(range_start_ms) / width;

        open = match open {
            Some((current, sum, count)) if current == index => {
                Some((current, sum + value, count + 1))
            }
            Some((current, sum, count)) => {
                buckets.push(close(range_start_ms, width, current, sum, count));
                Some((index, value, 1))
            }
            None => Some((index, value, 1)),
        };
    }

    if let Some((current, sum, count)) = open {
        buckets.push(close(range_start_ms, width, current, sum, count));
    }

    buckets
}

fn close(range_start_ms: i64, width: i64, index: i64, sum: f64, count: u32) -> Bucket {
    Bucket {
        window_start_ms: range_start_ms.saturating_add(index.saturating_mul(width)),
        value: sum / count as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::{MachineId, Sample};

    fn machine() -> MachineId {
        MachineId::new("1").unwrap()
    }

    fn window(ms: i64) -> AggregationWindow {
        AggregationWindow::from_millis(ms).unwrap()
    }

    #[test]
    fn test_live_push_replaces_history_then_buckets() {
        let history = vec![
            Sample::new(machine(), 0).with(Parameter::Temperature, 10.0),
            Sample::new(machine(), 61_000).with(Parameter::Temperature, 20.0),
        ];
        let push = vec![Sample::new(machine(), 61_000).with(Parameter::Temperature, 25.0)];
        let series = Series::new().merge(history).merge(push);

        assert_eq!(series.len(), 2);
        let buckets = aggregate(&series, Parameter::Temperature, window(60_000), 0, 120_000);
        assert_eq!(
            buckets,
            vec![
                Bucket { window_start_ms: 0, value: 10.0 },
                Bucket { window_start_ms: 60_000, value: 25.0 },
            ]
        );
    }

    #[test]
    fn test_empty_windows_are_omitted_not_zero() {
        let series = Series::new().merge(vec![
            Sample::new(machine(), 1_000).with(Parameter::Humidity, 40.0),
            Sample::new(machine(), 2_000).with(Parameter::Humidity, 44.0),
            Sample::new(machine(), 181_000).with(Parameter::Humidity, 50.0),
        ]);
        let buckets = aggregate(&series, Parameter::Humidity, window(60_000), 0, 240_000);
        assert_eq!(
            buckets,
            vec![
                Bucket { window_start_ms: 0, value: 42.0 },
                Bucket { window_start_ms: 180_000, value: 50.0 },
            ]
        );
        assert!(buckets.iter().all(|b| b.value != 0.0));
    }

    #[test]
    fn test_extreme_range_bounds_do_not_overflow() {
        let series = Series::new().merge(vec![
            Sample::new(machine(), i64::MAX - 1).with(Parameter::Temperature, 7.0),
        ]);
        let buckets =
            aggregate(&series, Parameter::Temperature, window(60_000), i64::MIN, i64::MAX);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].value, 7.0);
    }

    #[test]
    fn test_samples_without_parameter_are_ignored() {
        let series = Series::new().merge(vec![
            Sample::new(machine(), 1_000).with(Parameter::Vibration, 0.3),
            Sample::new(machine(), 2_000).with(Parameter::Temperature, 55.0),
        ]);
        let buckets = aggregate(&series, Parameter::Vibration, window(60_000), 0, 60_000);
        assert_eq!(buckets, vec![Bucket { window_start_ms: 0, value: 0.3 }]);
        assert!(aggregate(&series, Parameter::PowerSupply, window(60_000), 0, 60_000).is_empty());
    }

    #[test]
    fn test_samples_outside_range_are_excluded() {
        let series = Series::new().merge(vec![
            Sample::new(machine(), -1).with(Parameter::Temperature, 99.0),
            Sample::new(machine(), 30_000).with(Parameter::Temperature, 45.0),
            Sample::new(machine(), 60_001).with(Parameter::Temperature, 99.0),
        ]);
        let buckets = aggregate(&series, Parameter::Temperature, window(60_000), 0, 60_000);
        assert_eq!(buckets, vec![Bucket { window_start_ms: 0, value: 45.0 }]);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let series = Series::new().merge((0..500i64).map(|i| {
            let value = 230.0 + (i % 11) as f64 * 0.37;
            Sample::new(machine(), i * 997).with(Parameter::PowerSupply, value)
        }));
        let first = aggregate(&series, Parameter::PowerSupply, window(15_000), 0, 500_000);
        let second = aggregate(&series, Parameter::PowerSupply, window(15_000), 0, 500_000);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.window_start_ms, b.window_start_ms);
            assert_eq!(a.value.to_bits(), b.value.to_bits());
        }
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let series =
            Series::new().merge(vec![Sample::new(machine(), 10).with(Parameter::Temperature, 1.0)]);
        assert!(aggregate(&series, Parameter::Temperature, window(1_000), 100, 0).is_empty());
    }
}
