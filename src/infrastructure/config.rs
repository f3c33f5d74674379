use crate::application::live_feed::ReconnectPolicy;
use crate::domain::dashboard::ViewSelection;
use crate::domain::error::ReconcileError;
use crate::domain::sample::{MachineId, Parameter, PlantId};
use crate::domain::timeframe::{Timeframe, ViewMode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub backend: BackendSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    pub view: ViewSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub http_url: String,
    pub ws_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    pub max_reconnect_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_reconnect_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl FeedSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewSettings {
    pub plant_id: String,
    #[serde(default)]
    pub machines: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Empty means every parameter.
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub focus: Option<String>,
}

fn default_timeframe() -> String {
    Timeframe::FiveMinutes.as_str().to_string()
}

impl ViewSettings {
    /// Validates names into domain types. The initial view is always real-time.
    pub fn to_selection(&self) -> Result<ViewSelection, ReconcileError> {
        let machines = self
            .machines
            .iter()
            .map(MachineId::new)
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = self
            .parameters
            .iter()
            .map(|p| p.parse::<Parameter>())
            .collect::<Result<Vec<_>, _>>()?;
        let focus = self.focus.as_deref().map(str::parse::<Parameter>).transpose()?;

        Ok(ViewSelection {
            plant_id: PlantId::new(&self.plant_id)?,
            machines,
            mode: ViewMode::RealTime {
                timeframe: self.timeframe.parse()?,
            },
            parameters,
            focus,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("DASHBOARD")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("view.machines")
        .with_list_parse_key("view.parameters")
        .try_parsing(true)
}

/// Reads `config/dashboard.*`, then `DASHBOARD__SECTION__KEY` overrides.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(environment())
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn parse_dashboard_config(toml: &str) -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [backend]
        http_url = "http://localhost:8000"
        ws_url = "ws://localhost:8000"

        [feed]
        max_reconnect_attempts = 3
        initial_backoff_ms = 250
        max_backoff_ms = 2000

        [view]
        plant_id = "1"
        machines = ["1", "2"]
        timeframe = "15m"
        parameters = ["temperature", "power_supply"]
    "#;

    #[test]
    fn test_parse_dashboard_config() {
        let config = parse_dashboard_config(SAMPLE).unwrap();
        assert_eq!(config.backend.token, None);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.feed.policy().max_attempts, 3);
        assert_eq!(config.feed.policy().initial_backoff, Duration::from_millis(250));

        let selection = config.view.to_selection().unwrap();
        assert_eq!(selection.machines.len(), 2);
        assert_eq!(
            selection.mode,
            ViewMode::RealTime {
                timeframe: Timeframe::FifteenMinutes
            }
        );
        assert_eq!(selection.parameters, vec![Parameter::Temperature, Parameter::PowerSupply]);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_dashboard_config(
            r#"
            [backend]
            http_url = "http://h"
            ws_url = "ws://h"
            [view]
            plant_id = "2"
            "#,
        )
        .unwrap();
        assert_eq!(config.feed.policy(), ReconnectPolicy::default());
        let selection = config.view.to_selection().unwrap();
        assert!(selection.machines.is_empty());
        assert!(selection.mode.is_real_time());
    }

    #[test]
    fn test_bad_names_are_configuration_errors() {
        let mut view = parse_dashboard_config(SAMPLE).unwrap().view;
        view.timeframe = "2m".to_string();
        assert!(matches!(view.to_selection(), Err(ReconcileError::InvalidConfiguration(_))));

        view.timeframe = "5m".to_string();
        view.parameters = vec!["pressure".to_string()];
        assert!(view.to_selection().is_err());

        view.parameters.clear();
        view.machines = vec!["  ".to_string()];
        assert!(view.to_selection().is_err());
    }
}
