//! Trade records

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a simulated trade was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Target touched
    Win,
    /// Stop touched (including same-window ties)
    Loss,
    /// Neither level touched, closed at session end
    Neutral,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            "neutral" => Ok(Self::Neutral),
            other => anyhow::bail!("unknown outcome: {}", other),
        }
    }
}

/// One simulated round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Session date
    pub date: NaiveDate,
    /// Ticker symbol
    pub ticker: String,
    /// Breakout entry price
    pub entry_price: Decimal,
    /// Take-profit level
    pub target_price: Decimal,
    /// Stop-loss level
    pub stop_price: Decimal,
    /// Realized exit price
    pub exit_price: Decimal,
    /// How the trade closed
    pub outcome: Outcome,
    /// Return in percent, net of commission
    pub percent_gain: Decimal,
    /// Session volume
    pub volume: u64,
}
