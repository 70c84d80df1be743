use std::path::Path;
use crate::errors::VulnFusionError;
use super::types::VulnFusionConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<VulnFusionConfig, VulnFusionError> {
    if !path.exists() {
        return Err(VulnFusionError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(VulnFusionError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    // An empty file is a valid, all-defaults config.
    if yaml.is_null() {
        return Ok(VulnFusionConfig::default());
    }

    validate_schema(&yaml)?;

    let config: VulnFusionConfig = serde_yaml::from_value(yaml)?;

    validate_conflicts(&config)?;

    Ok(config)
}

/// Like `parse_config`, but a missing file yields the defaults.
pub async fn load_config(path: &Path) -> Result<VulnFusionConfig, VulnFusionError> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(VulnFusionConfig::default());
    }
    parse_config(path).await
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), VulnFusionError> {
    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| VulnFusionError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| VulnFusionError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory only: typed deserialisation below is the hard check.
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Reject values that deserialise but cannot be used.
fn validate_conflicts(config: &VulnFusionConfig) -> Result<(), VulnFusionError> {
    if config.database.path.trim().is_empty() {
        return Err(VulnFusionError::Config("database.path must not be empty".into()));
    }

    if let Some(level) = &config.log.level {
        tracing_subscriber::EnvFilter::try_new(level).map_err(|e| {
            VulnFusionError::Config(format!("Invalid log.level '{}': {}", level, e))
        })?;
    }

    Ok(())
}
