//! gapgo: Gap-up momentum screening and breakout backtesting
//!
//! This library provides the core components for:
//! - Bar validation and intraday session aggregation
//! - Candidate screening on price, volume, move and news confirmation
//! - Breakout trade simulation on daily or minute bars
//! - Trade ledger with summary statistics and diagnostics
//! - Feature derivation for labeled datasets
//! - Market data collection from Polygon.io
//! - JSON and Parquet persistence
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod bar;
pub mod cli;
pub mod config;
pub mod data;
pub mod features;
pub mod screen;
pub mod source;
pub mod telemetry;
