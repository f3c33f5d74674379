// Domain layer - Telemetry models and the pure reconciliation algorithms
pub mod aggregation;
pub mod dashboard;
pub mod error;
pub mod failures;
pub mod machine_status;
pub mod notification;
pub mod sample;
pub mod series;
pub mod timeframe;
