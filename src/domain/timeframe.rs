// Timeframes, view modes and the aggregation window table
use crate::domain::error::ReconcileError;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl Timeframe {
    /// Shortest first.
    pub const ALL: [Timeframe; 8] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::SixHours,
        Timeframe::TwelveHours,
        Timeframe::TwentyFourHours,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::SixHours => "6h",
            Timeframe::TwelveHours => "12h",
            Timeframe::TwentyFourHours => "24h",
        }
    }

    pub fn duration_ms(self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Timeframe::OneMinute => MINUTE,
            Timeframe::FiveMinutes => 5 * MINUTE,
            Timeframe::FifteenMinutes => 15 * MINUTE,
            Timeframe::ThirtyMinutes => 30 * MINUTE,
            Timeframe::OneHour => 60 * MINUTE,
            Timeframe::SixHours => 6 * 60 * MINUTE,
            Timeframe::TwelveHours => 12 * 60 * MINUTE,
            Timeframe::TwentyFourHours => 24 * 60 * MINUTE,
        }
    }

    pub fn aggregation_window(self) -> AggregationWindow {
        AGGREGATION_WINDOWS
            .iter()
            .find(|(timeframe, _)| *timeframe == self)
            .map(|(_, window)| *window)
            .unwrap_or(AggregationWindow::DEFAULT)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| ReconcileError::invalid(format!("unknown timeframe '{}'", s)))
    }
}

/// Width of one display bucket. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AggregationWindow {
    millis: i64,
}

impl AggregationWindow {
    pub const DEFAULT: AggregationWindow = AggregationWindow::secs(60);

    const fn secs(secs: i64) -> Self {
        Self {
            millis: secs * 1_000,
        }
    }

    pub fn from_millis(millis: i64) -> Result<Self, ReconcileError> {
        if millis <= 0 {
            return Err(ReconcileError::invalid(format!(
                "aggregation window must be positive, got {}ms",
                millis
            )));
        }
        Ok(Self { millis })
    }

    pub fn as_millis(self) -> i64 {
        self.millis
    }
}

/// Bucket width per rolling timeframe.
pub const AGGREGATION_WINDOWS: [(Timeframe, AggregationWindow); 8] = [
    (Timeframe::OneMinute, AggregationWindow::secs(15)),
    (Timeframe::FiveMinutes, AggregationWindow::secs(30)),
    (Timeframe::FifteenMinutes, AggregationWindow::secs(60)),
    (Timeframe::ThirtyMinutes, AggregationWindow::secs(60)),
    (Timeframe::OneHour, AggregationWindow::secs(60)),
    (Timeframe::SixHours, AggregationWindow::secs(1_800)),
    (Timeframe::TwelveHours, AggregationWindow::secs(1_800)),
    (Timeframe::TwentyFourHours, AggregationWindow::secs(1_800)),
];

/// Window for an explicit range: the row of the shortest timeframe covering the span.
pub fn window_for_span(span_ms: i64) -> AggregationWindow {
    Timeframe::ALL
        .into_iter()
        .find(|timeframe| timeframe.duration_ms() >= span_ms)
        .unwrap_or(Timeframe::TwentyFourHours)
        .aggregation_window()
}

/// Rounds `start_ms` down to a multiple of the window so buckets stay put as "now" advances.
pub fn aligned_start(start_ms: i64, window: AggregationWindow) -> i64 {
    start_ms.div_euclid(window.as_millis()) * window.as_millis()
}

/// What a view is showing: a trailing window ending now, or a fixed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewMode {
    RealTime { timeframe: Timeframe },
    Historical { start_ms: i64, end_ms: i64 },
}

impl ViewMode {
    /// A historical range must be ordered, have a span that fits in an `i64`
    /// and lie within the times chrono can label.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        let ViewMode::Historical { start_ms, end_ms } = *self else {
            return Ok(());
        };
        if end_ms < start_ms {
            return Err(ReconcileError::invalid(format!(
                "historical range ends ({}) before it starts ({})",
                end_ms, start_ms
            )));
        }
        if end_ms.checked_sub(start_ms).is_none() {
            return Err(ReconcileError::invalid(format!(
                "historical range {}..{} spans more than can be represented",
                start_ms, end_ms
            )));
        }
        for bound in [start_ms, end_ms] {
            if DateTime::from_timestamp_millis(bound).is_none() {
                return Err(ReconcileError::invalid(format!(
                    "historical range bound {} is outside the supported time range",
                    bound
                )));
            }
        }
        Ok(())
    }

    pub fn is_real_time(&self) -> bool {
        matches!(self, ViewMode::RealTime { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_table() {
        let secs = |tf: Timeframe| tf.aggregation_window().as_millis() / 1_000;
        assert_eq!(secs(Timeframe::OneMinute), 15);
        assert_eq!(secs(Timeframe::FiveMinutes), 30);
        assert_eq!(secs(Timeframe::FifteenMinutes), 60);
        assert_eq!(secs(Timeframe::OneHour), 60);
        assert_eq!(secs(Timeframe::SixHours), 1_800);
        assert_eq!(secs(Timeframe::TwentyFourHours), 1_800);
    }

    #[test]
    fn test_window_for_span() {
        assert_eq!(window_for_span(45_000).as_millis(), 15_000);
        assert_eq!(window_for_span(5 * 60_000).as_millis(), 30_000);
        assert_eq!(window_for_span(2 * 3_600_000).as_millis(), 1_800_000);
        assert_eq!(window_for_span(7 * 24 * 3_600_000).as_millis(), 1_800_000);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("12h".parse::<Timeframe>().unwrap(), Timeframe::TwelveHours);
        assert!("2d".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(AggregationWindow::from_millis(0).is_err());
        assert!(AggregationWindow::from_millis(-5).is_err());
    }

    #[test]
    fn test_aligned_start_handles_negative_times() {
        let window = AggregationWindow::from_millis(30_000).unwrap();
        assert_eq!(aligned_start(65_000, window), 60_000);
        assert_eq!(aligned_start(-180_000, window), -180_000);
        assert_eq!(aligned_start(-1, window), -30_000);
    }

    #[test]
    fn test_inverted_historical_range_is_invalid() {
        assert!(ViewMode::Historical { start_ms: 10, end_ms: 5 }.validate().is_err());
        assert!(ViewMode::Historical { start_ms: 5, end_ms: 5 }.validate().is_ok());
    }

    #[test]
    fn test_unrepresentable_historical_range_is_invalid() {
        let overflowing = ViewMode::Historical {
            start_ms: -1,
            end_ms: i64::MAX,
        };
        assert!(overflowing.validate().is_err());

        let beyond_calendar = ViewMode::Historical {
            start_ms: 0,
            end_ms: i64::MAX / 2,
        };
        assert!(beyond_calendar.validate().is_err());

        let decade = ViewMode::Historical {
            start_ms: 1_577_836_800_000,
            end_ms: 1_893_456_000_000,
        };
        assert!(decade.validate().is_ok());
    }
}
