//! External data collaborators
//!
//! Fetches daily and minute bars plus confirming news. The core pipeline
//! never calls these directly; `fetch` writes their output to disk and the
//! backtest reads it back.

mod polygon;

pub use polygon::PolygonClient;

use crate::bar::{BarRecord, RawBar};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Provider of raw bars
#[async_trait]
pub trait BarSource: Send + Sync {
    /// All tickers' daily bars for one date; empty on market holidays
    async fn daily_bars(&self, date: NaiveDate) -> anyhow::Result<Vec<RawBar>>;
    /// One ticker's minute bars for one session
    async fn minute_bars(&self, ticker: &str, date: NaiveDate) -> anyhow::Result<Vec<RawBar>>;
}

/// Provider of news confirmation
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Tickers with at least one article published on the date
    async fn news_tickers(&self, date: NaiveDate) -> anyhow::Result<BTreeSet<String>>;
}

/// Tickers with confirming news, per date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsIndex {
    by_date: BTreeMap<NaiveDate, BTreeSet<String>>,
}

impl NewsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, date: NaiveDate) {
        self.by_date.entry(date).or_default().insert(ticker.into());
    }

    pub fn extend(&mut self, date: NaiveDate, tickers: impl IntoIterator<Item = String>) {
        self.by_date.entry(date).or_default().extend(tickers);
    }

    pub fn has_news(&self, ticker: &str, date: NaiveDate) -> bool {
        self.by_date
            .get(&date)
            .is_some_and(|tickers| tickers.contains(ticker))
    }

    /// Number of (ticker, date) pairs
    pub fn len(&self) -> usize {
        self.by_date.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge another index into this one
    pub fn merge(&mut self, other: NewsIndex) {
        for (date, tickers) in other.by_date {
            self.extend(date, tickers);
        }
    }
}

/// Output of a date-range collection
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub bars: Vec<RawBar>,
    pub news: NewsIndex,
    /// Days that returned bars
    pub trading_days: usize,
    /// Days skipped after the provider kept failing
    pub failed_days: Vec<NaiveDate>,
}

/// Collect daily bars and news for every trading day in `[start, end]`.
///
/// Weekends are skipped without a request and days without bars count as
/// holidays. A missing previous close is filled from the ticker's close on
/// the preceding trading day. Provider failures skip the day rather than
/// abort the range.
pub async fn collect_range(
    bars: &dyn BarSource,
    news: &dyn NewsSource,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Collected> {
    if end < start {
        anyhow::bail!("end date {} is before start date {}", end, start);
    }

    let mut collected = Collected::default();
    let mut last_close: HashMap<String, Value> = HashMap::new();

    for date in start.iter_days().take_while(|d| *d <= end) {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }

        let mut day = match bars.daily_bars(date).await {
            Ok(day) => day,
            Err(e) => {
                tracing::warn!(%date, error = %e, "Failed to fetch daily bars, skipping day");
                collected.failed_days.push(date);
                continue;
            }
        };
        if day.is_empty() {
            tracing::debug!(%date, "No bars, market closed");
            continue;
        }

        for raw in &mut day {
            if raw.date.is_none() {
                raw.date = Some(date.to_string());
            }
            let Some(ticker) = raw.ticker_hint() else {
                continue;
            };
            if raw.prev_close.is_none() {
                raw.prev_close = last_close.get(&ticker).cloned();
            }
            if let Some(close) = &raw.close {
                last_close.insert(ticker, close.clone());
            }
        }

        match news.news_tickers(date).await {
            Ok(tickers) => collected.news.extend(date, tickers),
            Err(e) => {
                tracing::warn!(%date, error = %e, "Failed to fetch news, day has no confirmation")
            }
        }

        tracing::info!(%date, bars = day.len(), "Collected trading day");
        collected.trading_days += 1;
        collected.bars.append(&mut day);
    }

    Ok(collected)
}

/// Collect minute bars for screened daily candidates.
///
/// Each minute bar inherits the candidate's previous close so the session
/// keeps its gap reference once aggregated.
pub async fn collect_sessions(
    source: &dyn BarSource,
    candidates: &[BarRecord],
) -> anyhow::Result<Vec<RawBar>> {
    let mut collected = Vec::new();

    for candidate in candidates {
        let mut session = match source.minute_bars(&candidate.ticker, candidate.date).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    ticker = %candidate.ticker,
                    date = %candidate.date,
                    error = %e,
                    "Failed to fetch minute bars, skipping session"
                );
                continue;
            }
        };

        let prev_close = candidate
            .prev_close
            .map(|prev| Value::String(prev.to_string()));
        for raw in &mut session {
            raw.ticker.get_or_insert_with(|| candidate.ticker.clone());
            raw.date.get_or_insert_with(|| candidate.date.to_string());
            if raw.prev_close.is_none() {
                raw.prev_close = prev_close.clone();
            }
        }

        tracing::debug!(
            ticker = %candidate.ticker,
            date = %candidate.date,
            bars = session.len(),
            "Collected session"
        );
        collected.append(&mut session);
    }

    Ok(collected)
}
