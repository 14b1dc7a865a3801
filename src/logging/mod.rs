//! Structured logging setup.
//!
//! Follows this codebase's `LogConfig`/installer split: a serializable
//! config struct with defaulted fields, and a free function that builds a
//! `tracing-subscriber` from it. Unlike a long-running service, the search
//! engine is a one-shot CLI run, so there is no file rotation here -- only
//! the stdout JSON/pretty choice described in the expanded spec (§10.2).

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default = "default_format")]
    pub format: LogFormat,
}

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Machine-readable JSON lines, suited to CI.
    Json,
    /// Human-readable, suited to local runs.
    Pretty,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> LogFormat {
    LogFormat::Pretty
}

/// Install a global `tracing` subscriber built from `config`.
///
/// # Errors
/// Returns [`ConfigError::InvalidLogLevel`] if `config.level` is not a
/// recognized level name.
pub fn install(config: &LogConfig) -> Result<(), ConfigError> {
    let level: tracing::Level = config
        .level
        .parse()
        .map_err(|_| ConfigError::InvalidLogLevel(config.level.clone()))?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_info_and_pretty() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_unknown_level() {
        let config = LogConfig {
            level: "not-a-level".to_string(),
            format: LogFormat::Pretty,
        };
        assert!(matches!(install(&config), Err(ConfigError::InvalidLogLevel(_))));
    }
}
