use std::path::PathBuf;

use crate::config::parse_config;
use crate::errors::VulnFusionError;
use super::commands::ValidateArgs;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), VulnFusionError> {
    let path = PathBuf::from(&args.config);
    let config = parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    println!("  database: {} ({})", config.database.path, config.database.rebuild_strategy);
    Ok(())
}
