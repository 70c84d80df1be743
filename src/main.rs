use clap::Parser;
use tracing_subscriber::EnvFilter;

use vulnfusion::cli::{self, Cli, Commands};
use vulnfusion::config::{LogConfig, LogFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = cli.command.startup_config().await;
    let log_config = loaded.as_ref().map(|c| c.log.clone()).unwrap_or_default();
    init_logging(cli.verbose, cli.no_color, &log_config);

    let result = match loaded {
        Err(e) => Err(e),
        Ok(config) => match cli.command {
            Commands::Migrate(args) => cli::migrate::handle_migrate(args, config).await,
            Commands::Inspect(args) => cli::inspect::handle_inspect(args, config).await,
            Commands::Validate(args) => cli::validate::handle_validate(args).await,
        },
    };

    if let Err(e) = result {
        let class = e.classify();
        eprintln!("Error [{}]: {}", class.error_type, e);
        std::process::exit(class.exit_code);
    }
}

fn init_logging(verbose: u8, no_color: bool, log: &LogConfig) {
    let log_level = match verbose {
        0 => log.level.as_deref().unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!no_color)
            .with_writer(std::io::stderr)
            .init(),
    }
}
