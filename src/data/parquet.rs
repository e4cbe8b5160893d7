//! Parquet export of trades, equity curves and feature datasets

use crate::backtest::{EquityPoint, Outcome, Trade};
use crate::features::FeatureVector;
use crate::telemetry::{self, LatencyMetric};
use arrow::array::{Array, ArrayRef, Date32Array, StringArray, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Trade schema fields
pub fn trade_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("ticker", DataType::Utf8, false),
        Field::new("entry_price", DataType::Utf8, false), // Store as string for Decimal precision
        Field::new("target_price", DataType::Utf8, false),
        Field::new("stop_price", DataType::Utf8, false),
        Field::new("exit_price", DataType::Utf8, false),
        Field::new("outcome", DataType::Utf8, false),
        Field::new("percent_gain", DataType::Utf8, false),
        Field::new("volume", DataType::UInt64, false),
    ])
}

/// Equity curve schema fields
pub fn equity_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("ticker", DataType::Utf8, false),
        Field::new("equity", DataType::Utf8, false),
    ])
}

/// Feature dataset schema fields
pub fn feature_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("ticker", DataType::Utf8, false),
        Field::new("gap_pct", DataType::Utf8, true),
        Field::new("intraday_range_pct", DataType::Utf8, false),
        Field::new("close_to_open_pct", DataType::Utf8, false),
        Field::new("volatility_pct", DataType::Utf8, false),
        Field::new("volume", DataType::UInt64, false),
        Field::new("day_of_week", DataType::UInt8, false),
        Field::new("gain_pct", DataType::Utf8, false),
        Field::new("label", DataType::UInt8, false),
    ])
}

fn date32(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn from_date32(days: i32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
        .ok_or_else(|| anyhow::anyhow!("Invalid date value: {}", days))
}

fn decimal_column(values: impl Iterator<Item = Decimal>) -> ArrayRef {
    Arc::new(StringArray::from(
        values.map(|d| d.to_string()).collect::<Vec<_>>(),
    ))
}

/// Parquet writer rooted at an output directory
pub struct ParquetWriter {
    output_dir: PathBuf,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Path for a named dataset in the output directory
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.parquet", name))
    }

    fn write_batch(&self, path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> anyhow::Result<()> {
        let started = Instant::now();
        self.ensure_dir()?;

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        let batch = RecordBatch::try_new(schema, columns)?;
        writer.write(&batch)?;
        writer.close()?;

        telemetry::record_latency(LatencyMetric::Export, started.elapsed());
        Ok(())
    }

    /// Write trades to a Parquet file.
    ///
    /// An empty slice still replaces the file with a zero-row dataset.
    pub fn write_trades(&self, path: &Path, trades: &[Trade]) -> anyhow::Result<()> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(
                trades.iter().map(|t| date32(t.date)).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                trades.iter().map(|t| t.ticker.as_str()).collect::<Vec<_>>(),
            )),
            decimal_column(trades.iter().map(|t| t.entry_price)),
            decimal_column(trades.iter().map(|t| t.target_price)),
            decimal_column(trades.iter().map(|t| t.stop_price)),
            decimal_column(trades.iter().map(|t| t.exit_price)),
            Arc::new(StringArray::from(
                trades.iter().map(|t| t.outcome.as_str()).collect::<Vec<_>>(),
            )),
            decimal_column(trades.iter().map(|t| t.percent_gain)),
            Arc::new(UInt64Array::from(
                trades.iter().map(|t| t.volume).collect::<Vec<_>>(),
            )),
        ];

        self.write_batch(path, Arc::new(trade_schema()), columns)?;
        tracing::debug!(path = ?path, count = trades.len(), "Wrote trades to Parquet");
        Ok(())
    }

    /// Write an equity curve to a Parquet file
    pub fn write_equity_curve(&self, path: &Path, curve: &[EquityPoint]) -> anyhow::Result<()> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(
                curve.iter().map(|p| date32(p.date)).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                curve.iter().map(|p| p.ticker.as_str()).collect::<Vec<_>>(),
            )),
            decimal_column(curve.iter().map(|p| p.equity)),
        ];

        self.write_batch(path, Arc::new(equity_schema()), columns)?;
        tracing::debug!(path = ?path, count = curve.len(), "Wrote equity curve to Parquet");
        Ok(())
    }

    /// Write a labeled feature dataset to a Parquet file
    pub fn write_features(&self, path: &Path, features: &[FeatureVector]) -> anyhow::Result<()> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(
                features.iter().map(|f| date32(f.date)).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                features.iter().map(|f| f.ticker.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                features
                    .iter()
                    .map(|f| f.gap_pct.map(|d| d.to_string()))
                    .collect::<Vec<_>>(),
            )),
            decimal_column(features.iter().map(|f| f.intraday_range_pct)),
            decimal_column(features.iter().map(|f| f.close_to_open_pct)),
            decimal_column(features.iter().map(|f| f.volatility_pct)),
            Arc::new(UInt64Array::from(
                features.iter().map(|f| f.volume).collect::<Vec<_>>(),
            )),
            Arc::new(UInt8Array::from(
                features.iter().map(|f| f.day_of_week).collect::<Vec<_>>(),
            )),
            decimal_column(features.iter().map(|f| f.gain_pct)),
            Arc::new(UInt8Array::from(
                features.iter().map(|f| f.label).collect::<Vec<_>>(),
            )),
        ];

        self.write_batch(path, Arc::new(feature_schema()), columns)?;
        tracing::debug!(path = ?path, count = features.len(), "Wrote features to Parquet");
        Ok(())
    }
}

/// Reader for Parquet files
pub struct ParquetReader {
    path: PathBuf,
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
}

impl ParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read trades from a Parquet file
    pub fn read_trades(&self) -> anyhow::Result<Vec<Trade>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(&self.path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let reader = builder.build()?;

        let mut trades = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            let dates = column::<Date32Array>(&batch, "date")?;
            let tickers = column::<StringArray>(&batch, "ticker")?;
            let entries = column::<StringArray>(&batch, "entry_price")?;
            let targets = column::<StringArray>(&batch, "target_price")?;
            let stops = column::<StringArray>(&batch, "stop_price")?;
            let exits = column::<StringArray>(&batch, "exit_price")?;
            let outcomes = column::<StringArray>(&batch, "outcome")?;
            let gains = column::<StringArray>(&batch, "percent_gain")?;
            let volumes = column::<UInt64Array>(&batch, "volume")?;

            for i in 0..batch.num_rows() {
                trades.push(Trade {
                    date: from_date32(dates.value(i))?,
                    ticker: tickers.value(i).to_string(),
                    entry_price: Decimal::from_str(entries.value(i))?,
                    target_price: Decimal::from_str(targets.value(i))?,
                    stop_price: Decimal::from_str(stops.value(i))?,
                    exit_price: Decimal::from_str(exits.value(i))?,
                    outcome: Outcome::from_str(outcomes.value(i))?,
                    percent_gain: Decimal::from_str(gains.value(i))?,
                    volume: volumes.value(i),
                });
            }
        }

        Ok(trades)
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
