//! Persistence module
//!
//! Raw bars and news as JSON, trades, equity curves and feature datasets
//! as Parquet

mod json;
mod parquet;

pub use self::json::{load_news_index, load_raw_bars, save_news_index, save_raw_bars, write_summary_json};
pub use self::parquet::{
    equity_schema, feature_schema, trade_schema, ParquetReader, ParquetWriter,
};
