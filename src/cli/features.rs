//! Features command implementation

use crate::backtest::BacktestRunner;
use crate::config::Config;
use crate::data::{self, ParquetWriter};
use crate::features::{FeatureDeriver, FeatureVector};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct FeaturesArgs {
    /// Directory of daily bar files (defaults to data.data_dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Output directory for the dataset (defaults to data.output_dir)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl FeaturesArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<Vec<FeatureVector>> {
        let runner = BacktestRunner::new(config)?;
        let deriver = FeatureDeriver::new(config.features.clone())?;

        let data_dir = self.data_dir.as_ref().unwrap_or(&config.data.data_dir);
        let bars = data::load_raw_bars(data_dir)?;
        let news = data::load_news_index(&config.data.news_file)?;

        let (features, diagnostics) = runner.derive_features(&bars, &news, &deriver);

        let writer = ParquetWriter::new(
            self.output.clone().unwrap_or_else(|| config.data.output_dir.clone()),
        );
        let path = writer.file_path("features");
        writer.write_features(&path, &features)?;

        let positives = features.iter().filter(|f| f.label == 1).count();
        println!(
            "Wrote {} feature rows ({} labeled positive) to {}",
            features.len(),
            positives,
            path.display()
        );
        println!("{}", diagnostics.format_line());

        Ok(features)
    }
}
