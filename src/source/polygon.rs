//! Polygon.io REST client
//!
//! Grouped daily aggregates, per-ticker minute aggregates and ticker news.
//! Requests are spaced by a minimum interval and retried with exponential
//! backoff on throttling and server errors.

use super::{BarSource, NewsSource};
use crate::bar::RawBar;
use crate::config::SourceConfig;
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Environment variable consulted when no key is configured
pub const API_KEY_ENV: &str = "POLYGON_API_KEY";

const NEWS_PAGE_LIMIT: &str = "1000";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Client for the Polygon.io REST API
pub struct PolygonClient {
    config: SourceConfig,
    api_key: String,
    client: Client,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsArticle>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    #[serde(default)]
    tickers: Vec<String>,
}

impl PolygonClient {
    /// Create a client; the API key comes from config or `POLYGON_API_KEY`
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let api_key = match config.api_key.clone() {
            Some(key) if !key.is_empty() => key,
            _ => std::env::var(API_KEY_ENV).map_err(|_| {
                anyhow::anyhow!("no Polygon API key: set source.api_key or {}", API_KEY_ENV)
            })?,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
            last_request: Mutex::new(None),
        })
    }

    /// Wait until the minimum request interval has elapsed
    async fn throttle(&self) {
        let interval = Duration::from_millis(self.config.request_interval_ms);
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET with throttling and retry on 429/5xx and transport errors
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            self.throttle().await;
            tracing::debug!(url, attempt, "Polygon request");

            let outcome = self
                .client
                .get(url)
                .query(query)
                .query(&[("apiKey", self.api_key.as_str())])
                .send()
                .await;

            let retry_reason = match outcome {
                Ok(response) if response.status().is_success() => {
                    telemetry::increment(CounterMetric::SourceRequests, "ok");
                    telemetry::record_latency(LatencyMetric::SourceRequest, started.elapsed());
                    return Ok(response.json().await?);
                }
                Ok(response) if is_retryable(response.status()) => {
                    telemetry::increment(CounterMetric::SourceRequests, "retry");
                    format!("HTTP {}", response.status())
                }
                Ok(response) => {
                    telemetry::increment(CounterMetric::SourceRequests, "error");
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    anyhow::bail!("Polygon API error: {} - {}", status, body);
                }
                Err(e) => {
                    telemetry::increment(CounterMetric::SourceRequests, "retry");
                    e.to_string()
                }
            };

            if attempt >= self.config.max_retries {
                anyhow::bail!(
                    "Polygon request failed after {} attempts: {}",
                    attempt + 1,
                    retry_reason
                );
            }

            let delay = backoff(attempt);
            tracing::warn!(
                url,
                attempt,
                reason = %retry_reason,
                delay_ms = delay.as_millis() as u64,
                "Retrying Polygon request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn aggregates_to_bars(response: AggregatesResponse) -> Vec<RawBar> {
        response
            .results
            .unwrap_or_default()
            .into_iter()
            // Malformed entries stay in the batch so validation can classify them
            .map(|value| serde_json::from_value(value).unwrap_or_default())
            .collect()
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    let base = Duration::from_secs(1).saturating_mul(2u32.saturating_pow(attempt));
    base.min(MAX_BACKOFF)
}

#[async_trait]
impl BarSource for PolygonClient {
    async fn daily_bars(&self, date: NaiveDate) -> anyhow::Result<Vec<RawBar>> {
        let url = format!(
            "{}/v2/aggs/grouped/locale/us/market/stocks/{}",
            self.config.base_url, date
        );
        let response: AggregatesResponse = self.get_json(&url, &[("adjusted", "true")]).await?;

        let mut bars = Self::aggregates_to_bars(response);
        let day = date.to_string();
        for bar in &mut bars {
            bar.date = Some(day.clone());
        }
        Ok(bars)
    }

    async fn minute_bars(&self, ticker: &str, date: NaiveDate) -> anyhow::Result<Vec<RawBar>> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/minute/{}/{}",
            self.config.base_url, ticker, date, date
        );
        let response: AggregatesResponse = self
            .get_json(
                &url,
                &[("adjusted", "true"), ("sort", "asc"), ("limit", "50000")],
            )
            .await?;

        let mut bars = Self::aggregates_to_bars(response);
        let day = date.to_string();
        for bar in &mut bars {
            bar.ticker = Some(ticker.to_string());
            // Late after-hours bars fall on the next UTC day
            bar.date = Some(day.clone());
        }
        Ok(bars)
    }
}

#[async_trait]
impl NewsSource for PolygonClient {
    async fn news_tickers(&self, date: NaiveDate) -> anyhow::Result<BTreeSet<String>> {
        let next_day = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow::anyhow!("date out of range: {}", date))?;
        let (from, to) = (date.to_string(), next_day.to_string());

        let mut tickers = BTreeSet::new();
        let mut response: NewsResponse = self
            .get_json(
                &format!("{}/v2/reference/news", self.config.base_url),
                &[
                    ("published_utc.gte", from.as_str()),
                    ("published_utc.lt", to.as_str()),
                    ("limit", NEWS_PAGE_LIMIT),
                ],
            )
            .await?;

        loop {
            for article in response.results.drain(..) {
                tickers.extend(article.tickers);
            }
            let Some(next_url) = response.next_url.take() else {
                break;
            };
            response = self.get_json(&next_url, &[]).await?;
        }

        tracing::debug!(%date, tickers = tickers.len(), "Fetched news tickers");
        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(3), Duration::from_secs(8));
        assert_eq!(backoff(10), MAX_BACKOFF);
        assert_eq!(backoff(40), MAX_BACKOFF);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::FORBIDDEN));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_configured_key_wins() {
        let config = SourceConfig {
            api_key: Some("configured".to_string()),
            ..Default::default()
        };
        let client = PolygonClient::new(config).unwrap();
        assert_eq!(client.api_key, "configured");
    }

    #[test]
    fn test_aggregates_keep_malformed_entries() {
        let response: AggregatesResponse = serde_json::from_str(
            r#"{"results": [
                {"T": "AAA", "o": 10, "h": 11, "l": 9.5, "c": 10.5, "v": 1200000, "t": 1709586000000},
                {"T": ["not", "a", "ticker"]}
            ]}"#,
        )
        .unwrap();

        let bars = PolygonClient::aggregates_to_bars(response);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ticker.as_deref(), Some("AAA"));
        assert_eq!(bars[1], RawBar::default());
    }

    #[test]
    fn test_aggregates_without_results() {
        let response: AggregatesResponse =
            serde_json::from_str(r#"{"queryCount": 0, "resultsCount": 0}"#).unwrap();
        assert!(PolygonClient::aggregates_to_bars(response).is_empty());
    }

    #[test]
    fn test_news_response_parsing() {
        let response: NewsResponse = serde_json::from_str(
            r#"{"results": [{"tickers": ["AAA", "BBB"]}, {"title": "no tickers"}],
                "next_url": "https://api.polygon.io/v2/reference/news?cursor=abc"}"#,
        )
        .unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].tickers, vec!["AAA", "BBB"]);
        assert!(response.results[1].tickers.is_empty());
        assert!(response.next_url.is_some());
    }
}
