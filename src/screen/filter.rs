//! Candidate screening

use crate::bar::BarRecord;
use crate::config::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which derived percentage the move threshold is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningMode {
    /// Open-to-close move of the session
    #[default]
    PercentChange,
    /// Gap from the previous close to the open
    GapPercent,
}

/// Screening thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningCriteria {
    /// Lowest acceptable close (inclusive)
    #[serde(default = "default_min_price")]
    pub min_price: Decimal,
    /// Highest acceptable close (inclusive)
    #[serde(default = "default_max_price")]
    pub max_price: Decimal,
    /// Volume must be strictly above this
    #[serde(default = "default_min_volume")]
    pub min_volume: u64,
    /// Move in percent must be strictly above this
    #[serde(default = "default_min_percent_change")]
    pub min_percent_change: Decimal,
    /// Require confirming news for the ticker on the session date
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Baseline for the move threshold
    #[serde(default)]
    pub mode: ScreeningMode,
    /// In gap mode, compare a missing reference close as a 0% gap instead
    /// of excluding the candidate outright
    #[serde(default)]
    pub allow_zero_baseline: bool,
}

fn default_min_price() -> Decimal {
    dec!(1)
}
fn default_max_price() -> Decimal {
    dec!(100)
}
fn default_min_volume() -> u64 {
    1_000_000
}
fn default_min_percent_change() -> Decimal {
    dec!(5)
}

impl Default for ScreeningCriteria {
    fn default() -> Self {
        Self {
            min_price: dec!(1),
            max_price: dec!(100),
            min_volume: 1_000_000,
            min_percent_change: dec!(5),
            requires_confirmation: false,
            mode: ScreeningMode::PercentChange,
            allow_zero_baseline: false,
        }
    }
}

impl ScreeningCriteria {
    /// Check threshold consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_price < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "screening",
                "min_price",
                "must not be negative",
            ));
        }
        if self.min_price > self.max_price {
            return Err(ConfigError::invalid(
                "screening",
                "max_price",
                "must not be below min_price",
            ));
        }
        Ok(())
    }

    /// The percentage the move threshold applies to under this mode
    pub fn move_percent(&self, bar: &BarRecord) -> Decimal {
        match self.mode {
            ScreeningMode::PercentChange => bar.percent_change(),
            ScreeningMode::GapPercent => bar.gap_percent(),
        }
    }
}

/// Outcome of screening a bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    /// Bar is a backtest candidate
    Pass,
    /// Bar was excluded
    Reject(ScreenReject),
}

/// First criterion a bar failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenReject {
    /// Close outside the price bounds
    PriceOutOfRange(Decimal),
    /// Volume not above the minimum
    VolumeTooLow(u64),
    /// Gap mode without a usable previous close
    MissingBaseline,
    /// Move not above the minimum
    MoveTooSmall(Decimal),
    /// Confirmation required but no news
    NoConfirmation,
}

impl ScreenReject {
    /// Stable code used in diagnostics and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            Self::PriceOutOfRange(_) => "PRICE_OUT_OF_RANGE",
            Self::VolumeTooLow(_) => "VOLUME_TOO_LOW",
            Self::MissingBaseline => "MISSING_BASELINE",
            Self::MoveTooSmall(_) => "MOVE_TOO_SMALL",
            Self::NoConfirmation => "NO_CONFIRMATION",
        }
    }
}

/// Stateless screening predicate over validated bars
#[derive(Debug, Clone)]
pub struct ScreenFilter {
    criteria: ScreeningCriteria,
}

impl ScreenFilter {
    /// Create a filter, rejecting inconsistent criteria
    pub fn new(criteria: ScreeningCriteria) -> Result<Self, ConfigError> {
        criteria.validate()?;
        Ok(Self { criteria })
    }

    /// Criteria this filter applies
    pub fn criteria(&self) -> &ScreeningCriteria {
        &self.criteria
    }

    /// Apply all criteria, reporting the first one that fails
    pub fn apply(&self, bar: &BarRecord, has_news: bool) -> FilterResult {
        let criteria = &self.criteria;

        if bar.close < criteria.min_price || bar.close > criteria.max_price {
            return FilterResult::Reject(ScreenReject::PriceOutOfRange(bar.close));
        }

        if bar.volume <= criteria.min_volume {
            return FilterResult::Reject(ScreenReject::VolumeTooLow(bar.volume));
        }

        if criteria.mode == ScreeningMode::GapPercent
            && !bar.has_reference()
            && !criteria.allow_zero_baseline
        {
            return FilterResult::Reject(ScreenReject::MissingBaseline);
        }

        let move_pct = criteria.move_percent(bar);
        if move_pct <= criteria.min_percent_change {
            return FilterResult::Reject(ScreenReject::MoveTooSmall(move_pct));
        }

        if criteria.requires_confirmation && !has_news {
            return FilterResult::Reject(ScreenReject::NoConfirmation);
        }

        FilterResult::Pass
    }
}

/// Whether a bar is a backtest candidate under the given criteria
pub fn passes(bar: &BarRecord, criteria: &ScreeningCriteria, has_news: bool) -> bool {
    let filter = ScreenFilter {
        criteria: criteria.clone(),
    };
    filter.apply(bar, has_news) == FilterResult::Pass
}
