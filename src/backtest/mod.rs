//! Backtesting module
//!
//! Simulates breakout trades on screened candidates and aggregates them
//! into a ledger with summary statistics

mod analytics;
mod diagnostics;
mod ledger;
mod runner;
mod simulator;
mod trade;

pub use analytics::{equity_curve, summarize, EquityPoint, SummaryStats, TickerStats};
pub use diagnostics::{Diagnostics, Rejection};
pub use ledger::Ledger;
pub use runner::{BacktestReport, BacktestRunner, Evaluation, SimulationMode};
pub use simulator::{DegenerateInput, EntryLevels, Simulation, TradeSimulator, TradeState};
pub use trade::{Outcome, Trade};

use crate::config::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Entry and exit rules, all expressed as fractions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Minimum gap over the previous close required to trade; `None`
    /// disables the gap check
    #[serde(default)]
    pub gap_threshold: Option<Decimal>,
    /// Breakout trigger above the open
    #[serde(default = "default_entry_buffer")]
    pub entry_buffer: Decimal,
    /// Take-profit distance above entry
    #[serde(default = "default_target_percent")]
    pub target_percent: Decimal,
    /// Stop-loss distance below entry
    #[serde(default = "default_stop_percent")]
    pub stop_percent: Decimal,
    /// Cost charged on each side of the trade
    #[serde(default)]
    pub commission_rate: Decimal,
}

fn default_entry_buffer() -> Decimal {
    dec!(0.01)
}
fn default_target_percent() -> Decimal {
    dec!(0.02)
}
fn default_stop_percent() -> Decimal {
    dec!(0.01)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            gap_threshold: None,
            entry_buffer: dec!(0.01),
            target_percent: dec!(0.02),
            stop_percent: dec!(0.01),
            commission_rate: Decimal::ZERO,
        }
    }
}

impl StrategyConfig {
    /// Check the strategy invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_percent <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "strategy",
                "target_percent",
                "must be positive",
            ));
        }
        if self.stop_percent <= Decimal::ZERO || self.stop_percent >= Decimal::ONE {
            return Err(ConfigError::invalid(
                "strategy",
                "stop_percent",
                "must be in (0, 1)",
            ));
        }
        if self.entry_buffer < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "strategy",
                "entry_buffer",
                "must not be negative",
            ));
        }
        if matches!(self.gap_threshold, Some(gap) if gap < Decimal::ZERO) {
            return Err(ConfigError::invalid(
                "strategy",
                "gap_threshold",
                "must not be negative",
            ));
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(ConfigError::invalid(
                "strategy",
                "commission_rate",
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}
