//! Environment settings for the CLI

use qb_core::error::QbError;
use qb_core::result::QbResult;
use qb_core::traits::IdStrategy;

/// Output format of the log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Settings read from the environment (and `.env`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliSettings {
    /// `QB_LOG_FORMAT`: `pretty` or `json`
    pub log_format: LogFormat,
    /// `QB_ID_STRATEGY`: `uuid` or `sequential`
    pub id_strategy: IdStrategy,
}

impl CliSettings {
    pub fn from_env() -> QbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> QbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(format) = lookup("QB_LOG_FORMAT") {
            settings.log_format = LogFormat::from_str(&format).ok_or_else(|| {
                QbError::Config(format!("QB_LOG_FORMAT must be pretty or json, got {}", format))
            })?;
        }
        if let Some(strategy) = lookup("QB_ID_STRATEGY") {
            settings.id_strategy = IdStrategy::from_str(&strategy).ok_or_else(|| {
                QbError::Config(format!(
                    "QB_ID_STRATEGY must be uuid or sequential, got {}",
                    strategy
                ))
            })?;
        }

        Ok(settings)
    }
}
