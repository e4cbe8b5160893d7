//! Intraday session aggregation

use super::BarRecord;
use crate::config::ConfigError;
use chrono::NaiveTime;
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// Regular trading hours, in New York local time.
///
/// Intraday sessions are built from bars starting inside `[open, close)`,
/// so their open is the same regular-session open daily bars report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHours {
    #[serde(default = "default_open")]
    pub open: NaiveTime,
    #[serde(default = "default_close")]
    pub close: NaiveTime,
}

fn default_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default()
}

fn default_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default()
}

impl Default for SessionHours {
    fn default() -> Self {
        Self {
            open: default_open(),
            close: default_close(),
        }
    }
}

impl SessionHours {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open >= self.close {
            return Err(ConfigError::invalid(
                "runner",
                "session",
                "open must be before close",
            ));
        }
        Ok(())
    }

    /// Whether a bar starts inside regular hours. Bars without a timestamp
    /// carry no time of day and are kept.
    pub fn contains(&self, bar: &BarRecord) -> bool {
        match bar.timestamp {
            Some(ts) => {
                let local = ts.with_timezone(&New_York).time();
                self.open <= local && local < self.close
            }
            None => true,
        }
    }
}

/// Fold the intraday bars of one (ticker, date) session into a daily bar.
///
/// Bars must belong to the same session, be in time order and lie within
/// regular hours (see [`SessionHours::contains`]). The session
/// takes the first open, the extreme high and low, the last close and the
/// summed volume. Returns `None` for an empty slice.
pub fn aggregate_session(bars: &[BarRecord]) -> Option<BarRecord> {
    let first = bars.first()?;
    let last = bars.last()?;

    let high = bars.iter().map(|b| b.high).max()?;
    let low = bars.iter().map(|b| b.low).min()?;
    let volume = bars.iter().fold(0u64, |acc, b| acc.saturating_add(b.volume));

    Some(BarRecord {
        date: first.date,
        timestamp: None,
        ticker: first.ticker.clone(),
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
        prev_close: first.prev_close,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn minute(open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: u64) -> BarRecord {
        BarRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            timestamp: None,
            ticker: "ABCD".to_string(),
            open,
            high,
            low,
            close,
            volume,
            prev_close: Some(dec!(9)),
        }
    }

    #[test]
    fn test_aggregate_session() {
        let bars = vec![
            minute(dec!(10), dec!(10.4), dec!(9.9), dec!(10.3), 100),
            minute(dec!(10.3), dec!(10.9), dec!(10.2), dec!(10.8), 250),
            minute(dec!(10.8), dec!(10.8), dec!(9.7), dec!(9.8), 50),
        ];

        let session = aggregate_session(&bars).unwrap();
        assert_eq!(session.open, dec!(10));
        assert_eq!(session.high, dec!(10.9));
        assert_eq!(session.low, dec!(9.7));
        assert_eq!(session.close, dec!(9.8));
        assert_eq!(session.volume, 400);
        assert_eq!(session.prev_close, Some(dec!(9)));
    }

    fn at(utc: &str) -> BarRecord {
        let mut bar = minute(dec!(10), dec!(10), dec!(10), dec!(10), 1);
        bar.timestamp = Some(
            chrono::NaiveDateTime::parse_from_str(utc, "%Y-%m-%d %H:%M:%S")
                .unwrap()
                .and_utc(),
        );
        bar
    }

    #[test]
    fn test_session_hours_in_new_york_time() {
        let hours = SessionHours::default();
        // EST (UTC-5) before the March 10 switch
        assert!(!hours.contains(&at("2024-03-04 09:00:00")));
        assert!(!hours.contains(&at("2024-03-04 14:29:00")));
        assert!(hours.contains(&at("2024-03-04 14:30:00")));
        assert!(hours.contains(&at("2024-03-04 20:59:00")));
        assert!(!hours.contains(&at("2024-03-04 21:00:00")));
        // EDT (UTC-4) after it
        assert!(hours.contains(&at("2024-03-12 13:30:00")));
        assert!(!hours.contains(&at("2024-03-12 20:00:00")));
    }

    #[test]
    fn test_session_hours_keep_untimed_bars() {
        let bar = minute(dec!(10), dec!(10), dec!(10), dec!(10), 1);
        assert!(SessionHours::default().contains(&bar));
    }

    #[test]
    fn test_session_hours_validate() {
        assert!(SessionHours::default().validate().is_ok());
        let inverted = SessionHours {
            open: default_close(),
            close: default_open(),
        };
        assert_eq!(inverted.validate().unwrap_err().field, "session");
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate_session(&[]).is_none());
    }
}
