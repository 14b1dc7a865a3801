//! Layered configuration (§10.3): programmatic defaults, an optional YAML
//! file, and environment variables, merged through `figment` in the same
//! precedence order the teacher's `ConfigLoader` uses.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// The set of coverage criteria a search run pursues (§2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaConfig {
    pub names: Vec<String>,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self { names: vec!["Branch".to_string()] }
    }
}

/// Top-level search configuration (§6), merged from defaults, an optional
/// project YAML file, and `MOSAIC_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub population: u32,
    pub criteria: CriteriaConfig,
    pub iterations_wo_improvement: u32,
    pub zero_coverage_trigger: u32,
    pub max_archive_statements: u32,
    pub dp_dir: Option<String>,
    pub logging: LogConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population: 50,
            criteria: CriteriaConfig::default(),
            iterations_wo_improvement: 5,
            zero_coverage_trigger: 5,
            max_archive_statements: 100_000,
            dp_dir: None,
            logging: LogConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Validates the bounds called out in §10.3: population, archive
    /// budget, and stagnation threshold must be positive; the defect-score
    /// directory, if configured, must exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::InvalidPopulation(self.population));
        }
        if self.max_archive_statements == 0 {
            return Err(ConfigError::InvalidArchiveBudget(self.max_archive_statements));
        }
        if self.iterations_wo_improvement == 0 {
            return Err(ConfigError::InvalidStagnationThreshold(self.iterations_wo_improvement));
        }
        for name in &self.criteria.names {
            crate::domain::target::Criterion::parse(name)
                .ok_or_else(|| ConfigError::UnknownCriterion(name.clone()))?;
        }
        if let Some(dir) = &self.dp_dir {
            if !Path::new(dir).is_dir() {
                return Err(ConfigError::MissingDefectScoreDir(dir.clone()));
            }
        }
        Ok(())
    }
}

/// Loads [`SearchConfig`] from layered sources: defaults, an optional YAML
/// file, then `MOSAIC_`-prefixed environment variables (highest precedence).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration with defaults only, plus environment overrides.
    pub fn load() -> Result<SearchConfig, ConfigError> {
        Self::load_from_optional_file(None)
    }

    /// Loads configuration, merging `path` (if it exists) between defaults
    /// and environment variables.
    pub fn load_from_optional_file(path: Option<&Path>) -> Result<SearchConfig, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(SearchConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: SearchConfig = figment
            .merge(Env::prefixed("MOSAIC_").split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }
}
