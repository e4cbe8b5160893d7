//! Raw bar validation

use super::{BarRecord, RawBar, RejectionReason};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Validate and normalize a raw bar.
///
/// Pure and total: every input yields either a [`BarRecord`] or the first
/// [`RejectionReason`] found. Feeding a validated bar back through
/// `RawBar::from` yields the same record.
pub fn validate(raw: &RawBar) -> Result<BarRecord, RejectionReason> {
    let ticker = raw
        .ticker
        .as_deref()
        .ok_or(RejectionReason::MissingField("ticker"))?
        .trim();
    if ticker.is_empty() {
        return Err(RejectionReason::TickerInvalid);
    }

    let (date, timestamp) = resolve_date(raw)?;

    let open = required(&raw.open, "open")?;
    let high = required(&raw.high, "high")?;
    let low = required(&raw.low, "low")?;
    let close = required(&raw.close, "close")?;
    let volume = required(&raw.volume, "volume")?;
    let prev_close = optional(&raw.prev_close, "prev_close")?;

    if open <= Decimal::ZERO || close <= Decimal::ZERO {
        return Err(RejectionReason::PriceRangeInvalid("open and close must be positive"));
    }
    if high <= Decimal::ZERO || low <= Decimal::ZERO {
        return Err(RejectionReason::PriceRangeInvalid("high and low must be positive"));
    }
    if low > high {
        return Err(RejectionReason::PriceRangeInvalid("low above high"));
    }
    if open < low || open > high || close < low || close > high {
        return Err(RejectionReason::PriceRangeInvalid("open or close outside low-high"));
    }

    if volume < Decimal::ZERO {
        return Err(RejectionReason::VolumeInvalid);
    }
    let volume = volume.trunc().to_u64().ok_or(RejectionReason::VolumeInvalid)?;

    Ok(BarRecord {
        date,
        timestamp,
        ticker: ticker.to_string(),
        open: open.normalize(),
        high: high.normalize(),
        low: low.normalize(),
        close: close.normalize(),
        volume,
        prev_close: prev_close
            .filter(|prev| *prev > Decimal::ZERO)
            .map(|prev| prev.normalize()),
    })
}

fn resolve_date(raw: &RawBar) -> Result<(NaiveDate, Option<DateTime<Utc>>), RejectionReason> {
    let timestamp = match raw.timestamp {
        Some(ms) => Some(
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| RejectionReason::DateInvalid(ms.to_string()))?,
        ),
        None => None,
    };

    let text = raw.date.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match (text, timestamp) {
        (Some(text), ts) => {
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return Ok((date, ts));
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                let dt = dt.with_timezone(&Utc);
                return Ok((dt.date_naive(), ts.or(Some(dt))));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                return Ok((dt.date(), ts.or(Some(dt.and_utc()))));
            }
            Err(RejectionReason::DateInvalid(text.to_string()))
        }
        (None, Some(ts)) => Ok((ts.date_naive(), Some(ts))),
        (None, None) => Err(RejectionReason::MissingField("date")),
    }
}

fn required(value: &Option<Value>, field: &'static str) -> Result<Decimal, RejectionReason> {
    optional(value, field)?.ok_or(RejectionReason::MissingField(field))
}

fn optional(value: &Option<Value>, field: &'static str) -> Result<Option<Decimal>, RejectionReason> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => parse_decimal(&n.to_string())
            .map(Some)
            .ok_or(RejectionReason::NonNumericField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_decimal(s.trim())
            .map(Some)
            .ok_or(RejectionReason::NonNumericField(field)),
        Some(_) => Err(RejectionReason::NonNumericField(field)),
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
