//! Bar record types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An unvalidated bar as handed over by a data feed.
///
/// Numeric fields are kept as raw JSON values so that missing and
/// non-numeric inputs can be told apart during validation. Both the long
/// field names and the provider's short aggregate keys are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    /// Session date (`YYYY-MM-DD`, optionally with a time part)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Ticker symbol
    #[serde(default, alias = "T", skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    /// Bar start as epoch milliseconds
    #[serde(default, alias = "t", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, alias = "o", skip_serializing_if = "Option::is_none")]
    pub open: Option<Value>,
    #[serde(default, alias = "h", skip_serializing_if = "Option::is_none")]
    pub high: Option<Value>,
    #[serde(default, alias = "l", skip_serializing_if = "Option::is_none")]
    pub low: Option<Value>,
    #[serde(default, alias = "c", skip_serializing_if = "Option::is_none")]
    pub close: Option<Value>,
    #[serde(default, alias = "v", skip_serializing_if = "Option::is_none")]
    pub volume: Option<Value>,
    /// Previous session close, if the feed supplies one
    #[serde(default, alias = "pc", skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<Value>,
}

impl RawBar {
    /// Ticker as given, for diagnostics on rejected records
    pub fn ticker_hint(&self) -> Option<String> {
        self.ticker.clone()
    }

    /// Date as given (or derived from the timestamp), for diagnostics
    pub fn date_hint(&self) -> Option<String> {
        self.date.clone().or_else(|| {
            self.timestamp
                .and_then(DateTime::from_timestamp_millis)
                .map(|ts| ts.date_naive().to_string())
        })
    }
}

impl From<&BarRecord> for RawBar {
    fn from(bar: &BarRecord) -> Self {
        let number = |d: Decimal| Some(Value::String(d.to_string()));
        Self {
            date: Some(bar.date.format("%Y-%m-%d").to_string()),
            ticker: Some(bar.ticker.clone()),
            timestamp: bar.timestamp.map(|ts| ts.timestamp_millis()),
            open: number(bar.open),
            high: number(bar.high),
            low: number(bar.low),
            close: number(bar.close),
            volume: Some(Value::from(bar.volume)),
            prev_close: bar.prev_close.and_then(number),
        }
    }
}

/// One validated trading session (or one intraday bar) for one ticker.
///
/// Guaranteed by construction: prices are positive, `low <= open, close <= high`,
/// and `prev_close`, when present, is positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRecord {
    pub date: NaiveDate,
    /// Bar start for intraday bars
    pub timestamp: Option<DateTime<Utc>>,
    pub ticker: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub prev_close: Option<Decimal>,
}

impl BarRecord {
    /// Open-to-close move in percent, 0 when open is not positive
    pub fn percent_change(&self) -> Decimal {
        if self.open <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.close - self.open) / self.open * dec!(100)
    }

    /// Previous-close-to-open gap in percent, 0 without a reference close
    pub fn gap_percent(&self) -> Decimal {
        match self.prev_close {
            Some(prev) if prev > Decimal::ZERO => (self.open - prev) / prev * dec!(100),
            _ => Decimal::ZERO,
        }
    }

    /// Whether a usable previous close is available
    pub fn has_reference(&self) -> bool {
        matches!(self.prev_close, Some(prev) if prev > Decimal::ZERO)
    }
}

/// Why a raw bar was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RejectionReason {
    /// A required field is absent or null
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// A numeric field holds something that is not a number
    #[error("non-numeric field: {0}")]
    NonNumericField(&'static str),
    /// Prices violate positivity or the low/high envelope
    #[error("invalid price range: {0}")]
    PriceRangeInvalid(&'static str),
    /// Volume is negative or not representable
    #[error("invalid volume")]
    VolumeInvalid,
    /// Ticker is empty
    #[error("empty ticker")]
    TickerInvalid,
    /// Date cannot be parsed
    #[error("invalid date: {0}")]
    DateInvalid(String),
}

impl RejectionReason {
    /// Stable reason code used in diagnostics and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::NonNumericField(_) => "NON_NUMERIC_FIELD",
            Self::PriceRangeInvalid(_) => "PRICE_RANGE_INVALID",
            Self::VolumeInvalid => "VOLUME_INVALID",
            Self::TickerInvalid => "TICKER_INVALID",
            Self::DateInvalid(_) => "DATE_INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: Decimal, close: Decimal, prev_close: Option<Decimal>) -> BarRecord {
        BarRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            timestamp: None,
            ticker: "ABCD".to_string(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000,
            prev_close,
        }
    }

    #[test]
    fn test_percent_change() {
        let b = bar(dec!(10), dec!(12), None);
        assert_eq!(b.percent_change(), dec!(20));
    }

    #[test]
    fn test_gap_percent() {
        let b = bar(dec!(10), dec!(10.2), Some(dec!(8)));
        assert_eq!(b.gap_percent(), dec!(25));
        assert!(b.has_reference());
    }

    #[test]
    fn test_gap_percent_without_reference_is_zero() {
        let b = bar(dec!(10), dec!(10.2), None);
        assert_eq!(b.gap_percent(), Decimal::ZERO);
        assert!(!b.has_reference());
    }

    #[test]
    fn test_raw_bar_accepts_short_keys() {
        let json = r#"{"T":"ABCD","o":10.5,"h":11,"l":10,"c":10.8,"v":250000,"t":1709524800000,"vw":10.6}"#;
        let raw: RawBar = serde_json::from_str(json).unwrap();
        assert_eq!(raw.ticker.as_deref(), Some("ABCD"));
        assert_eq!(raw.timestamp, Some(1_709_524_800_000));
        assert!(raw.open.is_some());
        assert!(raw.prev_close.is_none());
        assert_eq!(raw.date_hint().as_deref(), Some("2024-03-04"));
    }

    #[test]
    fn test_raw_bar_null_is_missing() {
        let raw: RawBar = serde_json::from_str(r#"{"ticker":"X","open":null}"#).unwrap();
        assert!(raw.open.is_none());
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(
            RejectionReason::MissingField("open").code(),
            "MISSING_FIELD"
        );
        assert_eq!(
            RejectionReason::PriceRangeInvalid("low above high").code(),
            "PRICE_RANGE_INVALID"
        );
        assert_eq!(
            RejectionReason::MissingField("open").to_string(),
            "missing field: open"
        );
    }
}
