//! Fetch command implementation

use crate::backtest::BacktestRunner;
use crate::bar::{validate, BarRecord};
use crate::config::Config;
use crate::data;
use crate::screen::FilterResult;
use crate::source::{self, PolygonClient};
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// First date to collect (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last date to collect, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Also fetch minute bars for every screened candidate
    #[arg(long)]
    pub minute: bool,
}

impl FetchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = PolygonClient::new(config.source.clone())?;

        let collected = source::collect_range(&client, &client, self.start, self.end).await?;
        if !collected.failed_days.is_empty() {
            tracing::warn!(days = ?collected.failed_days, "Some days could not be fetched");
        }

        let file_name = format!("bars_{}_{}.jsonl", self.start, self.end);
        data::save_raw_bars(&config.data.data_dir.join(&file_name), &collected.bars)?;

        let mut news = data::load_news_index(&config.data.news_file)?;
        news.merge(collected.news.clone());
        data::save_news_index(&config.data.news_file, &news)?;

        println!(
            "Fetched {} bars over {} trading days",
            collected.bars.len(),
            collected.trading_days
        );

        if self.minute {
            let runner = BacktestRunner::new(config)?;
            let candidates: Vec<BarRecord> = collected
                .bars
                .iter()
                .filter_map(|raw| validate(raw).ok())
                .filter(|bar| {
                    let has_news = news.has_news(&bar.ticker, bar.date);
                    runner.filter().apply(bar, has_news) == FilterResult::Pass
                })
                .collect();

            tracing::info!(candidates = candidates.len(), "Fetching minute sessions");
            let minute_bars = source::collect_sessions(&client, &candidates).await?;
            data::save_raw_bars(&config.data.minute_dir.join(&file_name), &minute_bars)?;
            println!(
                "Fetched {} minute bars for {} candidates",
                minute_bars.len(),
                candidates.len()
            );
        }

        Ok(())
    }
}
