//! Backtest command implementation

use crate::backtest::{BacktestReport, BacktestRunner, SimulationMode};
use crate::config::Config;
use crate::data::{self, ParquetWriter};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// Report rendering on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Directory of raw bar files (defaults to data.data_dir, or
    /// data.minute_dir with --intraday)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Simulate along minute bars instead of daily bars
    #[arg(long)]
    pub intraday: bool,

    /// Output directory for results (defaults to data.output_dir)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format: json or table
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Parallel evaluation chunks (defaults to runner.concurrency)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl BacktestArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<BacktestReport> {
        let mut runner = BacktestRunner::new(config)?;
        if let Some(concurrency) = self.concurrency {
            runner = runner.with_concurrency(concurrency);
        }

        let mode = if self.intraday {
            SimulationMode::Intraday
        } else {
            config.runner.mode
        };
        let data_dir = self.data_dir.clone().unwrap_or_else(|| match mode {
            SimulationMode::Daily => config.data.data_dir.clone(),
            SimulationMode::Intraday => config.data.minute_dir.clone(),
        });

        tracing::info!(data_dir = ?data_dir, ?mode, "Running backtest");

        let bars = data::load_raw_bars(&data_dir)?;
        let news = Arc::new(data::load_news_index(&config.data.news_file)?);

        let report = match mode {
            SimulationMode::Daily => runner.run(bars, news).await?,
            SimulationMode::Intraday => runner.run_intraday(bars, news).await?,
        };

        let output_dir = self.output.clone().unwrap_or_else(|| config.data.output_dir.clone());
        let writer = ParquetWriter::new(output_dir.clone());
        let summary = report.summary();
        report.publish(&summary);

        writer.write_trades(&writer.file_path("trades"), &report.ledger.snapshot())?;
        writer.write_equity_curve(&writer.file_path("equity"), &report.ledger.equity_curve())?;
        data::write_summary_json(&output_dir.join("summary.json"), &summary, &report.diagnostics)?;

        match self.format {
            OutputFormat::Table => {
                println!("{}", summary.format_table());
                println!("{}", report.diagnostics.format_line());
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        }

        Ok(report)
    }
}
