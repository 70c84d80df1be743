use serde::{Deserialize, Serialize};

use crate::schema::{RebuildStrategy, ReconcileOptions};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_DB_PATH: &str = "data/vulnfusion.db";
pub const DB_PATH_ENV: &str = "VULNFUSION_DB_PATH";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct VulnFusionConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default)]
    pub rebuild_strategy: RebuildStrategy,
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            rebuild_strategy: RebuildStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct LogConfig {
    /// EnvFilter directive, e.g. `info` or `vulnfusion=debug`.
    pub level: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl VulnFusionConfig {
    /// Apply `VULNFUSION_DB_PATH`, then the `--db` flag, over the file value.
    pub fn apply_overrides(&mut self, env_db_path: Option<String>, flag_db_path: Option<&str>) {
        if let Some(path) = env_db_path.filter(|p| !p.is_empty()) {
            self.database.path = path;
        }
        if let Some(path) = flag_db_path {
            self.database.path = path.to_string();
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            strategy: self.database.rebuild_strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VulnFusionConfig::default();
        assert_eq!(config.database.path, "data/vulnfusion.db");
        assert_eq!(config.database.rebuild_strategy, RebuildStrategy::Transactional);
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_flag_beats_env() {
        let mut config = VulnFusionConfig::default();
        config.apply_overrides(Some("/env/db".into()), Some("/flag/db"));
        assert_eq!(config.database.path, "/flag/db");

        let mut config = VulnFusionConfig::default();
        config.apply_overrides(Some("/env/db".into()), None);
        assert_eq!(config.database.path, "/env/db");

        let mut config = VulnFusionConfig::default();
        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.database.path, DEFAULT_DB_PATH);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: VulnFusionConfig =
            serde_yaml::from_str("database:\n  rebuild_strategy: journaled\n").unwrap();
        assert_eq!(config.database.path, DEFAULT_DB_PATH);
        assert_eq!(config.reconcile_options().strategy, RebuildStrategy::Journaled);
    }
}
