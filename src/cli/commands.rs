use clap::{Parser, Subcommand, Args};
use std::path::Path;

use crate::config::{load_config, VulnFusionConfig, DEFAULT_CONFIG_PATH};
use crate::errors::VulnFusionError;
use crate::schema::RebuildStrategy;

#[derive(Parser)]
#[command(name = "vulnfusion", version, about = "VulnFusion scan tracker schema management")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile every entity table with its declaration
    Migrate(MigrateArgs),
    /// Show how the live schema differs from the declarations (read-only)
    Inspect(InspectArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

impl Commands {
    pub fn config_path(&self) -> &str {
        match self {
            Self::Migrate(args) => &args.config,
            Self::Inspect(args) => &args.config,
            Self::Validate(args) => &args.config,
        }
    }

    /// Configuration to start the command with. `validate` starts from the
    /// defaults and reports on its file through its own strict parse.
    pub async fn startup_config(&self) -> Result<VulnFusionConfig, VulnFusionError> {
        match self {
            Self::Validate(_) => Ok(VulnFusionConfig::default()),
            _ => load_config(Path::new(self.config_path())).await,
        }
    }
}

#[derive(Args, Clone)]
pub struct MigrateArgs {
    /// SQLite database file (overrides config and VULNFUSION_DB_PATH)
    #[arg(long)]
    pub db: Option<String>,

    /// YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Rebuild strategy: transactional, journaled
    #[arg(long)]
    pub strategy: Option<RebuildStrategy>,
}

#[derive(Args, Clone)]
pub struct InspectArgs {
    /// SQLite database file (overrides config and VULNFUSION_DB_PATH)
    #[arg(long)]
    pub db: Option<String>,

    /// YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Print the inspection as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// YAML configuration file to validate
    #[arg(short, long)]
    pub config: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migrate_with_strategy() {
        let cli = Cli::try_parse_from(["vulnfusion", "-vv", "migrate", "--db", "x.db", "--strategy", "journaled"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Migrate(args) => {
                assert_eq!(args.db.as_deref(), Some("x.db"));
                assert_eq!(args.config, "config.yaml");
                assert_eq!(args.strategy, Some(RebuildStrategy::Journaled));
            }
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        assert!(Cli::try_parse_from(["vulnfusion", "migrate", "--strategy", "yolo"]).is_err());
    }

    #[tokio::test]
    async fn test_validate_skips_startup_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        tokio::fs::write(&path, "database: [unclosed").await.unwrap();
        let path = path.to_str().unwrap();

        let validate = Cli::try_parse_from(["vulnfusion", "validate", "-c", path]).unwrap();
        assert_eq!(validate.command.startup_config().await.unwrap(), VulnFusionConfig::default());

        let migrate = Cli::try_parse_from(["vulnfusion", "migrate", "-c", path]).unwrap();
        assert!(migrate.command.startup_config().await.is_err());
    }

    #[test]
    fn test_validate_requires_config() {
        assert!(Cli::try_parse_from(["vulnfusion", "validate"]).is_err());
        let cli = Cli::try_parse_from(["vulnfusion", "validate", "-c", "vf.yaml"]).unwrap();
        assert_eq!(cli.command.config_path(), "vf.yaml");
    }
}
