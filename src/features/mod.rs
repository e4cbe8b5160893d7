//! Feature derivation for labeled datasets
//!
//! Features use the session open as the reference price for every percent
//! move, the same reference the trade simulator uses for its entry levels.

use crate::bar::BarRecord;
use crate::config::ConfigError;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Labeling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Intraday gain over the open, as a fraction, that earns label 1
    #[serde(default = "default_target_gain")]
    pub target_gain: Decimal,
}

fn default_target_gain() -> Decimal {
    dec!(0.02)
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            target_gain: default_target_gain(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_gain <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "features",
                "target_gain",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Derived features for one ticker-day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub date: NaiveDate,
    pub ticker: String,
    /// Previous close to open; `None` without a reference close
    pub gap_pct: Option<Decimal>,
    /// Open to high
    pub intraday_range_pct: Decimal,
    /// Open to close
    pub close_to_open_pct: Decimal,
    /// Low to high, relative to the open
    pub volatility_pct: Decimal,
    pub volume: u64,
    /// 0 = Monday
    pub day_of_week: u8,
    /// Open to high
    pub gain_pct: Decimal,
    pub label: u8,
}

/// Pure feature extraction
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    config: FeatureConfig,
}

impl FeatureDeriver {
    pub fn new(config: FeatureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Derive features from a validated bar
    pub fn derive(&self, bar: &BarRecord) -> FeatureVector {
        let open = bar.open;
        let pct = |value: Decimal| {
            if open <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                value / open * dec!(100)
            }
        };

        let gain_pct = pct(bar.high - open);
        let label = u8::from(gain_pct >= self.config.target_gain * dec!(100));

        FeatureVector {
            date: bar.date,
            ticker: bar.ticker.clone(),
            gap_pct: bar.has_reference().then(|| bar.gap_percent()),
            intraday_range_pct: gain_pct,
            close_to_open_pct: pct(bar.close - open),
            volatility_pct: pct(bar.high - bar.low),
            volume: bar.volume,
            day_of_week: bar.date.weekday().num_days_from_monday() as u8,
            gain_pct,
            label,
        }
    }
}
