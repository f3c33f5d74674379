// Plant dashboard - Live series reconciliation for industrial telemetry
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
