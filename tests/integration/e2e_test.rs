//! End-to-end integration tests

use gapgo::backtest::{BacktestRunner, Outcome};
use gapgo::bar::RawBar;
use gapgo::cli::{BacktestArgs, FeaturesArgs, OutputFormat};
use gapgo::config::Config;
use gapgo::data::{self, ParquetReader, ParquetWriter};
use gapgo::source::NewsIndex;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn raw(value: serde_json::Value) -> RawBar {
    serde_json::from_value(value).unwrap()
}

fn sample_bars() -> Vec<RawBar> {
    vec![
        raw(json!({"T": "WIN", "date": "2024-03-05", "o": 10, "h": 11, "l": 10, "c": 10.8, "v": 2_000_000, "pc": 9})),
        raw(json!({"T": "LOSS", "date": "2024-03-04", "o": 10, "h": 11, "l": 9.5, "c": 10.6, "v": 3_000_000, "pc": 9})),
        raw(json!({"T": "THIN", "date": "2024-03-04", "o": 10, "h": 11, "l": 9.9, "c": 10.8, "v": 1_000_000, "pc": 9})),
        raw(json!({"T": "BAD", "date": "2024-03-04", "o": "ten", "h": 11, "l": 9.9, "c": 10.8, "v": 2_000_000})),
    ]
}

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.data.data_dir = dir.path().join("bars");
    config.data.minute_dir = dir.path().join("minute");
    config.data.news_file = dir.path().join("news.json");
    config.data.output_dir = dir.path().join("output");
    config
}

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.strategy.target_percent, dec!(0.02));
    assert_eq!(config.screening.min_volume, 1_000_000);
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[strategy]\ntarget_percent = \"abc\"\nstop_percent = 0.5\n").unwrap();

    assert!(Config::load_if_present(&path).is_err());
    assert!(Config::load_if_present(dir.path().join("missing.toml"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_files_to_parquet_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    data::save_raw_bars(&config.data.data_dir.join("bars.jsonl"), &sample_bars()).unwrap();
    let bars = data::load_raw_bars(&config.data.data_dir).unwrap();
    assert_eq!(bars.len(), 4);

    let runner = BacktestRunner::new(&config).unwrap();
    let report = runner.run(bars, Arc::new(NewsIndex::default())).await.unwrap();
    assert_eq!(report.diagnostics.traded, 2);
    assert_eq!(report.diagnostics.rejected["NON_NUMERIC_FIELD"], 1);
    assert_eq!(report.diagnostics.screened_out["VOLUME_TOO_LOW"], 1);

    let writer = ParquetWriter::new(config.data.output_dir.clone());
    let path = writer.file_path("trades");
    writer.write_trades(&path, &report.ledger.snapshot()).unwrap();

    let read = ParquetReader::new(path).read_trades().unwrap();
    assert_eq!(read, report.ledger.snapshot());
    assert_eq!(read[0].ticker, "LOSS");
    assert_eq!(read[0].outcome, Outcome::Loss);
    assert_eq!(read[1].outcome, Outcome::Win);
}

#[tokio::test]
async fn test_backtest_command_writes_outputs() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    data::save_raw_bars(&config.data.data_dir.join("bars.jsonl"), &sample_bars()).unwrap();

    let args = BacktestArgs {
        data_dir: None,
        intraday: false,
        output: None,
        format: OutputFormat::Json,
        concurrency: Some(2),
    };
    let report = args.execute(&config).await.unwrap();
    assert_eq!(report.summary().total_trades, 2);

    let output = &config.data.output_dir;
    assert!(output.join("trades.parquet").exists());
    assert!(output.join("equity.parquet").exists());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["summary"]["total_trades"], 2);
    assert_eq!(summary["diagnostics"]["records_seen"], 4);
}

#[tokio::test]
async fn test_backtest_command_honours_confirmation() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.screening.requires_confirmation = true;
    data::save_raw_bars(&config.data.data_dir.join("bars.jsonl"), &sample_bars()).unwrap();

    let mut news = NewsIndex::new();
    news.insert("WIN", NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    data::save_news_index(&config.data.news_file, &news).unwrap();

    let args = BacktestArgs {
        data_dir: None,
        intraday: false,
        output: None,
        format: OutputFormat::Table,
        concurrency: None,
    };
    let report = args.execute(&config).await.unwrap();
    let trades = report.ledger.snapshot();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].ticker, "WIN");
}

#[tokio::test]
async fn test_features_command() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    data::save_raw_bars(&config.data.data_dir.join("bars.jsonl"), &sample_bars()).unwrap();

    let args = FeaturesArgs {
        data_dir: None,
        output: None,
    };
    let features = args.execute(&config).await.unwrap();

    let tickers: Vec<&str> = features.iter().map(|f| f.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["LOSS", "WIN"]);
    assert!(features.iter().all(|f| f.label == 1));
    assert!(config.data.output_dir.join("features.parquet").exists());
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.strategy.target_percent = dec!(-0.01);

    let args = BacktestArgs {
        data_dir: None,
        intraday: false,
        output: None,
        format: OutputFormat::Table,
        concurrency: None,
    };
    let err = args.execute(&config).await.unwrap_err();
    assert!(err.to_string().contains("strategy.target_percent"));
    assert!(!config.data.output_dir.exists());
}

#[tokio::test]
async fn test_rerun_without_trades_replaces_outputs() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    data::save_raw_bars(&config.data.data_dir.join("bars.jsonl"), &sample_bars()).unwrap();

    let quiet_dir = dir.path().join("quiet");
    let thin: Vec<RawBar> = sample_bars()
        .into_iter()
        .filter(|bar| bar.ticker_hint().as_deref() == Some("THIN"))
        .collect();
    data::save_raw_bars(&quiet_dir.join("bars.jsonl"), &thin).unwrap();

    let args = |data_dir: Option<std::path::PathBuf>| BacktestArgs {
        data_dir,
        intraday: false,
        output: None,
        format: OutputFormat::Table,
        concurrency: None,
    };
    let first = args(None).execute(&config).await.unwrap();
    assert_eq!(first.summary().total_trades, 2);

    let second = args(Some(quiet_dir.clone())).execute(&config).await.unwrap();
    assert!(second.ledger.is_empty());

    let output = &config.data.output_dir;
    let trades = ParquetReader::new(output.join("trades.parquet")).read_trades().unwrap();
    assert!(trades.is_empty());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["summary"]["total_trades"], 0);

    let features_args = |data_dir: Option<std::path::PathBuf>| FeaturesArgs {
        data_dir,
        output: None,
    };
    assert_eq!(features_args(None).execute(&config).await.unwrap().len(), 2);
    assert!(features_args(Some(quiet_dir)).execute(&config).await.unwrap().is_empty());
    assert!(output.join("features.parquet").exists());
}
