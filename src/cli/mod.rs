//! CLI interface for gapgo
//!
//! Provides subcommands for:
//! - `fetch`: Download daily bars, news and optional minute sessions
//! - `backtest`: Screen and simulate stored bars
//! - `features`: Build the labeled feature dataset
//! - `config`: Show the effective configuration

mod backtest;
mod features;
mod fetch;

pub use backtest::{BacktestArgs, OutputFormat};
pub use features::FeaturesArgs;
pub use fetch::FetchArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gapgo")]
#[command(about = "Gap-up momentum screener and breakout backtester")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download market data into the data directory
    Fetch(FetchArgs),
    /// Run a backtest over stored bars
    Backtest(BacktestArgs),
    /// Build the labeled feature dataset
    Features(FeaturesArgs),
    /// Show configuration
    Config,
}
