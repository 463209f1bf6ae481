use crate::aggregate::{MONTH_DOT_LIMIT, WEEK_EVENT_LIMIT};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_DURATION_MINUTES: i64 = 30;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaConfig {
    /// Layout length given to events without a usable end.
    pub default_duration_minutes: i64,
    pub month_dot_limit: usize,
    pub week_event_limit: usize,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        AgendaConfig {
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            month_dot_limit: MONTH_DOT_LIMIT,
            week_event_limit: WEEK_EVENT_LIMIT,
        }
    }
}

impl AgendaConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::minutes(self.default_duration_minutes)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_duration_minutes <= 0 {
            return Err(ConfigError::Invalid(format!(
                "default_duration_minutes must be positive, got {}",
                self.default_duration_minutes
            )));
        }
        Ok(())
    }

    /// Reads the config at `path`, or returns defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(AgendaConfig::default());
        }
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: AgendaConfig =
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}
