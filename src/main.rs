use clap::Parser;
use gapgo::cli::{Cli, Commands};
use gapgo::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; only a missing file falls back to defaults
    let config = match Config::load_if_present(&cli.config)? {
        Some(config) => config,
        None => {
            eprintln!("Warning: {} not found", cli.config);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    // Invalid settings are fatal before any work starts
    config.validate()?;

    // Initialize telemetry
    let telemetry = gapgo::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Fetch(args) => {
            tracing::info!(start = %args.start, end = %args.end, "Starting data fetch");
            args.execute(&config).await?;
        }
        Commands::Backtest(args) => {
            tracing::info!("Starting backtest");
            args.execute(&config).await?;
        }
        Commands::Features(args) => {
            tracing::info!("Building feature dataset");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", config.to_toml()?);
        }
    }

    if let Some(path) = &config.telemetry.metrics_file {
        telemetry.write_metrics(path)?;
    }

    Ok(())
}
