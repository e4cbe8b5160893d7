//! Batch pipeline: validate, screen, simulate, fold

use super::{
    DegenerateInput, Diagnostics, Ledger, Rejection, Simulation, SummaryStats, Trade,
    TradeSimulator,
};
use crate::bar::{aggregate_session, validate, BarRecord, RawBar, SessionHours};
use crate::config::{Config, ConfigError};
use crate::features::{FeatureDeriver, FeatureVector};
use crate::screen::{FilterResult, ScreenFilter, ScreenReject};
use crate::source::NewsIndex;
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Granularity of the price path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// One bar per ticker-day
    #[default]
    Daily,
    /// Minute bars grouped into sessions
    Intraday,
}

/// Terminal result of one record (daily) or one session (intraday)
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Rejected(Rejection),
    ScreenedOut(ScreenReject),
    Degenerate(DegenerateInput),
    NoBreakout,
    BelowGapThreshold,
    Traded(Trade),
}

/// Ledger plus the accounting of everything that did not trade
#[derive(Debug, Clone, Default)]
pub struct BacktestReport {
    pub ledger: Ledger,
    pub diagnostics: Diagnostics,
}

impl BacktestReport {
    /// Statistics recomputed from the ledger
    pub fn summary(&self) -> SummaryStats {
        self.ledger.summarize()
    }

    /// Record result gauges and log the run outcome for a summary of this
    /// report's ledger
    pub fn publish(&self, summary: &SummaryStats) {
        let as_f64 = |value: Decimal| value.to_f64().unwrap_or_default();

        telemetry::set_gauge(GaugeMetric::TradeCount, summary.total_trades as f64);
        telemetry::set_gauge(GaugeMetric::WinRate, as_f64(summary.win_rate));
        telemetry::set_gauge(GaugeMetric::TotalReturn, as_f64(summary.total_return));
        telemetry::set_gauge(
            GaugeMetric::CumulativeReturn,
            as_f64(summary.cumulative_return),
        );
        telemetry::set_gauge(GaugeMetric::MaxDrawdown, as_f64(summary.max_drawdown));

        if self.diagnostics.total_rejected() > 0 {
            tracing::warn!(
                rejected = self.diagnostics.total_rejected(),
                "Some records failed validation"
            );
        }
        tracing::info!(
            trades = summary.total_trades,
            win_rate = %summary.win_rate.round_dp(2),
            "{}",
            self.diagnostics.format_line()
        );
    }
}

/// Runs the screening and simulation pipeline over batches of records
#[derive(Debug, Clone)]
pub struct BacktestRunner {
    filter: ScreenFilter,
    simulator: TradeSimulator,
    session_hours: SessionHours,
    concurrency: usize,
}

impl BacktestRunner {
    /// Build a runner; any configuration error aborts before simulation
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            filter: ScreenFilter::new(config.screening.clone())?,
            simulator: TradeSimulator::new(config.strategy.clone())?,
            session_hours: config.runner.session,
            concurrency: config.runner.concurrency.max(1),
        })
    }

    /// Override the number of parallel evaluation chunks
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn filter(&self) -> &ScreenFilter {
        &self.filter
    }

    pub fn simulator(&self) -> &TradeSimulator {
        &self.simulator
    }

    /// Evaluate one raw daily record
    pub fn evaluate(&self, index: usize, raw: &RawBar, news: &NewsIndex) -> Evaluation {
        match validate(raw) {
            Ok(bar) => {
                let has_news = news.has_news(&bar.ticker, bar.date);
                self.evaluate_bar(&bar, has_news)
            }
            Err(reason) => Evaluation::Rejected(Rejection {
                index,
                ticker: raw.ticker_hint(),
                date: raw.date_hint(),
                reason,
            }),
        }
    }

    /// Screen and simulate one validated daily bar
    pub fn evaluate_bar(&self, bar: &BarRecord, has_news: bool) -> Evaluation {
        if let FilterResult::Reject(reason) = self.filter.apply(bar, has_news) {
            return Evaluation::ScreenedOut(reason);
        }
        Self::from_simulation(self.simulator.simulate_daily(bar))
    }

    /// Screen and simulate one intraday session, bars in time order
    pub fn evaluate_session(&self, path: &[BarRecord], has_news: bool) -> Evaluation {
        let Some(session) = aggregate_session(path) else {
            return Evaluation::Degenerate(DegenerateInput::EmptySession);
        };
        if let FilterResult::Reject(reason) = self.filter.apply(&session, has_news) {
            return Evaluation::ScreenedOut(reason);
        }
        Self::from_simulation(self.simulator.simulate_intraday(&session, path))
    }

    fn from_simulation(result: Result<Simulation, DegenerateInput>) -> Evaluation {
        match result {
            Ok(Simulation::Filled(trade)) => Evaluation::Traded(trade),
            Ok(Simulation::NoBreakout) => Evaluation::NoBreakout,
            Ok(Simulation::BelowGapThreshold) => Evaluation::BelowGapThreshold,
            Err(degenerate) => Evaluation::Degenerate(degenerate),
        }
    }

    /// Backtest daily bars
    pub async fn run(&self, bars: Vec<RawBar>, news: Arc<NewsIndex>) -> anyhow::Result<BacktestReport> {
        let started = Instant::now();
        let diagnostics = Diagnostics {
            records_seen: bars.len(),
            ..Default::default()
        };

        tracing::info!(
            records = bars.len(),
            concurrency = self.concurrency,
            "Running daily backtest"
        );

        let indexed: Vec<(usize, RawBar)> = bars.into_iter().enumerate().collect();
        let evaluations = self
            .fan_out(indexed, move |runner, (index, raw)| {
                runner.evaluate(index, &raw, &news)
            })
            .await?;

        let report = Self::fold(evaluations, diagnostics);
        telemetry::record_latency(LatencyMetric::Backtest, started.elapsed());
        Ok(report)
    }

    /// Backtest intraday bars, grouped into (ticker, date) sessions of
    /// regular-hours bars
    pub async fn run_intraday(
        &self,
        bars: Vec<RawBar>,
        news: Arc<NewsIndex>,
    ) -> anyhow::Result<BacktestReport> {
        let started = Instant::now();
        let mut diagnostics = Diagnostics {
            records_seen: bars.len(),
            ..Default::default()
        };

        let mut grouped: BTreeMap<(String, NaiveDate), Vec<BarRecord>> = BTreeMap::new();
        for (index, raw) in bars.iter().enumerate() {
            match validate(raw) {
                Ok(bar) if !self.session_hours.contains(&bar) => {
                    diagnostics.outside_session += 1;
                }
                Ok(bar) => grouped
                    .entry((bar.ticker.clone(), bar.date))
                    .or_default()
                    .push(bar),
                Err(reason) => Self::reject(
                    &mut diagnostics,
                    Rejection {
                        index,
                        ticker: raw.ticker_hint(),
                        date: raw.date_hint(),
                        reason,
                    },
                ),
            }
        }

        let sessions = prepare_sessions(grouped);
        diagnostics.sessions_seen = sessions.len();

        tracing::info!(
            records = diagnostics.records_seen,
            outside_session = diagnostics.outside_session,
            sessions = sessions.len(),
            concurrency = self.concurrency,
            "Running intraday backtest"
        );

        let evaluations = self
            .fan_out(sessions, move |runner, path: Vec<BarRecord>| {
                let has_news = path
                    .first()
                    .is_some_and(|bar| news.has_news(&bar.ticker, bar.date));
                runner.evaluate_session(&path, has_news)
            })
            .await?;

        let report = Self::fold(evaluations, diagnostics);
        telemetry::record_latency(LatencyMetric::Backtest, started.elapsed());
        Ok(report)
    }

    /// Screen daily bars and derive labeled features for the candidates
    pub fn derive_features(
        &self,
        bars: &[RawBar],
        news: &NewsIndex,
        deriver: &FeatureDeriver,
    ) -> (Vec<FeatureVector>, Diagnostics) {
        let mut diagnostics = Diagnostics {
            records_seen: bars.len(),
            ..Default::default()
        };
        let mut features = Vec::new();

        for (index, raw) in bars.iter().enumerate() {
            let bar = match validate(raw) {
                Ok(bar) => bar,
                Err(reason) => {
                    Self::reject(
                        &mut diagnostics,
                        Rejection {
                            index,
                            ticker: raw.ticker_hint(),
                            date: raw.date_hint(),
                            reason,
                        },
                    );
                    continue;
                }
            };

            let has_news = news.has_news(&bar.ticker, bar.date);
            match self.filter.apply(&bar, has_news) {
                FilterResult::Pass => {
                    diagnostics.candidates += 1;
                    features.push(deriver.derive(&bar));
                }
                FilterResult::Reject(reason) => {
                    telemetry::increment(CounterMetric::ScreenedOut, reason.code());
                    diagnostics.record_screened_out(reason.code());
                }
            }
        }

        features.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        tracing::info!(
            candidates = features.len(),
            "{}",
            diagnostics.format_line()
        );
        (features, diagnostics)
    }

    async fn fan_out<T, F>(&self, items: Vec<T>, evaluate: F) -> anyhow::Result<Vec<Evaluation>>
    where
        T: Send + 'static,
        F: Fn(&BacktestRunner, T) -> Evaluation + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let evaluate = Arc::new(evaluate);
        let chunk_size = items.len().div_ceil(self.concurrency);
        let mut tasks = JoinSet::new();
        let mut items = items.into_iter();
        let mut chunk_count = 0usize;

        loop {
            let chunk: Vec<T> = items.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let runner = self.clone();
            let evaluate = Arc::clone(&evaluate);
            let chunk_index = chunk_count;
            tasks.spawn_blocking(move || {
                let results: Vec<Evaluation> = chunk
                    .into_iter()
                    .map(|item| evaluate(&runner, item))
                    .collect();
                (chunk_index, results)
            });
            chunk_count += 1;
        }

        let mut chunks = Vec::with_capacity(chunk_count);
        while let Some(joined) = tasks.join_next().await {
            chunks.push(joined?);
        }
        chunks.sort_by_key(|(chunk_index, _)| *chunk_index);

        Ok(chunks.into_iter().flat_map(|(_, results)| results).collect())
    }

    fn fold(evaluations: Vec<Evaluation>, mut diagnostics: Diagnostics) -> BacktestReport {
        let mut ledger = Ledger::new();

        for evaluation in evaluations {
            match evaluation {
                Evaluation::Rejected(rejection) => Self::reject(&mut diagnostics, rejection),
                Evaluation::ScreenedOut(reason) => {
                    telemetry::increment(CounterMetric::ScreenedOut, reason.code());
                    diagnostics.record_screened_out(reason.code());
                }
                Evaluation::Degenerate(degenerate) => {
                    tracing::debug!(reason = %degenerate, "Skipping degenerate candidate");
                    telemetry::increment(CounterMetric::Degenerate, degenerate.code());
                    diagnostics.record_degenerate(degenerate.code());
                }
                Evaluation::NoBreakout => diagnostics.no_breakout += 1,
                Evaluation::BelowGapThreshold => diagnostics.below_gap_threshold += 1,
                Evaluation::Traded(trade) => {
                    tracing::debug!(
                        ticker = %trade.ticker,
                        date = %trade.date,
                        outcome = %trade.outcome,
                        percent_gain = %trade.percent_gain,
                        "Simulated trade"
                    );
                    telemetry::increment(CounterMetric::Trades, trade.outcome.as_str());
                    diagnostics.traded += 1;
                    ledger.append(trade);
                }
            }
        }

        BacktestReport {
            ledger,
            diagnostics,
        }
    }

    fn reject(diagnostics: &mut Diagnostics, rejection: Rejection) {
        tracing::debug!(
            index = rejection.index,
            ticker = ?rejection.ticker,
            date = ?rejection.date,
            code = rejection.reason.code(),
            reason = %rejection.reason,
            "Rejected bar"
        );
        telemetry::increment(CounterMetric::BarsRejected, rejection.reason.code());
        diagnostics.record_rejection(rejection);
    }
}

/// Order each session's bars by time and fill a missing previous close from
/// the ticker's prior session
fn prepare_sessions(grouped: BTreeMap<(String, NaiveDate), Vec<BarRecord>>) -> Vec<Vec<BarRecord>> {
    let mut sessions = Vec::with_capacity(grouped.len());
    let mut last_close: Option<(String, Decimal)> = None;

    for ((ticker, _date), mut bars) in grouped {
        bars.sort_by_key(|bar| bar.timestamp);

        let carried = match &last_close {
            Some((last_ticker, close)) if *last_ticker == ticker => Some(*close),
            _ => None,
        };
        if let Some(first) = bars.first_mut() {
            if first.prev_close.is_none() {
                first.prev_close = carried;
            }
        }

        last_close = bars.last().map(|bar| (ticker.clone(), bar.close));
        sessions.push(bars);
    }

    sessions
}
