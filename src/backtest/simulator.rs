//! Breakout trade simulator
//!
//! A trade moves `AwaitingBreakout -> Open -> Closed`. Entry triggers when a
//! bar's high reaches `open * (1 + entry_buffer)`. Once open, the same bar
//! and every later bar are checked against the target and stop. OHLC data
//! cannot order a target touch against a stop touch inside one bar, so a
//! bar that reaches both closes the trade at the stop.

use super::{Outcome, StrategyConfig, Trade};
use crate::bar::BarRecord;
use crate::config::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;

/// Input that cannot be simulated
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DegenerateInput {
    /// Gap entry configured but the bar has no usable previous close
    #[error("missing previous close for gap entry")]
    MissingPrevClose,
    /// Intraday session without any bars
    #[error("empty intraday session")]
    EmptySession,
}

impl DegenerateInput {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPrevClose => "MISSING_PREV_CLOSE",
            Self::EmptySession => "EMPTY_SESSION",
        }
    }
}

/// Result of simulating one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Simulation {
    /// Breakout confirmed and the trade closed
    Filled(Trade),
    /// Price never reached the breakout entry
    NoBreakout,
    /// Gap from the previous close did not exceed the threshold
    BelowGapThreshold,
}

/// Price levels derived from the reference open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLevels {
    pub breakout_entry: Decimal,
    pub target_price: Decimal,
    pub stop_price: Decimal,
}

/// Simulation state for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    AwaitingBreakout,
    Open,
    Closed { outcome: Outcome, exit_price: Decimal },
}

impl TradeState {
    /// Advance the state over one bar
    pub fn step(self, bar: &BarRecord, levels: &EntryLevels) -> Self {
        match self {
            Self::AwaitingBreakout if bar.high >= levels.breakout_entry => {
                Self::Open.step(bar, levels)
            }
            Self::AwaitingBreakout => Self::AwaitingBreakout,
            Self::Open => {
                let stop_hit = bar.low <= levels.stop_price;
                let target_hit = bar.high >= levels.target_price;
                if stop_hit {
                    Self::Closed {
                        outcome: Outcome::Loss,
                        exit_price: levels.stop_price,
                    }
                } else if target_hit {
                    Self::Closed {
                        outcome: Outcome::Win,
                        exit_price: levels.target_price,
                    }
                } else {
                    Self::Open
                }
            }
            closed @ Self::Closed { .. } => closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// Stateless simulator for a validated strategy
#[derive(Debug, Clone)]
pub struct TradeSimulator {
    config: StrategyConfig,
}

impl TradeSimulator {
    /// Create a simulator, rejecting invalid strategy settings
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Entry, target and stop for a reference open
    pub fn levels(&self, open: Decimal) -> EntryLevels {
        let breakout_entry = open * (Decimal::ONE + self.config.entry_buffer);
        EntryLevels {
            breakout_entry,
            target_price: breakout_entry * (Decimal::ONE + self.config.target_percent),
            stop_price: breakout_entry * (Decimal::ONE - self.config.stop_percent),
        }
    }

    /// Simulate a single daily bar.
    ///
    /// # Panics
    ///
    /// Panics if `bar.open` is not positive; bars must be validated first.
    pub fn simulate_daily(&self, bar: &BarRecord) -> Result<Simulation, DegenerateInput> {
        self.simulate_path(bar, std::slice::from_ref(bar))
    }

    /// Simulate a session along its intraday path.
    ///
    /// `session` supplies the reference open, previous close, ticker, date
    /// and volume; `path` holds the session's bars in time order.
    ///
    /// # Panics
    ///
    /// Panics if `session.open` is not positive; bars must be validated first.
    pub fn simulate_intraday(
        &self,
        session: &BarRecord,
        path: &[BarRecord],
    ) -> Result<Simulation, DegenerateInput> {
        if path.is_empty() {
            return Err(DegenerateInput::EmptySession);
        }
        self.simulate_path(session, path)
    }

    fn simulate_path(
        &self,
        session: &BarRecord,
        path: &[BarRecord],
    ) -> Result<Simulation, DegenerateInput> {
        assert!(
            session.open > Decimal::ZERO,
            "simulator received unvalidated bar for {} on {}",
            session.ticker,
            session.date
        );

        if !self.gap_qualifies(session)? {
            return Ok(Simulation::BelowGapThreshold);
        }

        let levels = self.levels(session.open);
        let mut state = TradeState::AwaitingBreakout;
        for bar in path {
            state = state.step(bar, &levels);
            if state.is_closed() {
                break;
            }
        }

        let (outcome, exit_price) = match state {
            TradeState::AwaitingBreakout => return Ok(Simulation::NoBreakout),
            TradeState::Open => {
                // Invariant: path is non-empty here
                let last_close = path.last().map_or(session.close, |bar| bar.close);
                (Outcome::Neutral, last_close)
            }
            TradeState::Closed {
                outcome,
                exit_price,
            } => (outcome, exit_price),
        };

        Ok(Simulation::Filled(self.close_trade(
            session, &levels, outcome, exit_price,
        )))
    }

    fn gap_qualifies(&self, session: &BarRecord) -> Result<bool, DegenerateInput> {
        let Some(threshold) = self.config.gap_threshold else {
            return Ok(true);
        };
        let prev_close = match session.prev_close {
            Some(prev) if prev > Decimal::ZERO => prev,
            _ => return Err(DegenerateInput::MissingPrevClose),
        };
        let gap = (session.open - prev_close) / prev_close;
        Ok(gap > threshold)
    }

    fn close_trade(
        &self,
        session: &BarRecord,
        levels: &EntryLevels,
        outcome: Outcome,
        exit_price: Decimal,
    ) -> Trade {
        let entry = levels.breakout_entry;
        let gross = (exit_price - entry) / entry * dec!(100);
        let costs = self.config.commission_rate * dec!(200);

        Trade {
            date: session.date,
            ticker: session.ticker.clone(),
            entry_price: entry,
            target_price: levels.target_price,
            stop_price: levels.stop_price,
            exit_price,
            outcome,
            percent_gain: gross - costs,
            volume: session.volume,
        }
    }
}
