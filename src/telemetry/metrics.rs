//! Prometheus metrics

use std::time::Duration;

/// Counter metric types, labeled by a reason or outcome code
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Raw records that failed validation
    BarsRejected,
    /// Valid bars excluded by screening
    ScreenedOut,
    /// Candidates that could not be simulated
    Degenerate,
    /// Simulated trades
    Trades,
    /// Requests sent to the market data provider
    SourceRequests,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Whole backtest run
    Backtest,
    /// One provider request, retries included
    SourceRequest,
    /// Parquet or JSON export
    Export,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Trades in the ledger
    TradeCount,
    /// Win rate in percent
    WinRate,
    /// Sum of percent gains
    TotalReturn,
    /// Compounded return as a fraction
    CumulativeReturn,
    /// Largest equity drawdown as a fraction
    MaxDrawdown,
}

/// Increment a labeled counter
pub fn increment(metric: CounterMetric, label: &'static str) {
    let (metric_name, label_key) = match metric {
        CounterMetric::BarsRejected => ("gapgo_bars_rejected_total", "reason"),
        CounterMetric::ScreenedOut => ("gapgo_screened_out_total", "reason"),
        CounterMetric::Degenerate => ("gapgo_degenerate_inputs_total", "reason"),
        CounterMetric::Trades => ("gapgo_trades_total", "outcome"),
        CounterMetric::SourceRequests => ("gapgo_source_requests_total", "status"),
    };

    ::metrics::counter!(metric_name, label_key => label).increment(1);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::Backtest => "gapgo_backtest_duration_ms",
        LatencyMetric::SourceRequest => "gapgo_source_request_latency_ms",
        LatencyMetric::Export => "gapgo_export_duration_ms",
    };

    let value_ms = duration.as_secs_f64() * 1000.0;
    tracing::trace!(metric = metric_name, value_ms, "Recording latency");
    ::metrics::histogram!(metric_name).record(value_ms);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::TradeCount => "gapgo_trade_count",
        GaugeMetric::WinRate => "gapgo_win_rate_pct",
        GaugeMetric::TotalReturn => "gapgo_total_return_pct",
        GaugeMetric::CumulativeReturn => "gapgo_cumulative_return",
        GaugeMetric::MaxDrawdown => "gapgo_max_drawdown",
    };

    ::metrics::gauge!(metric_name).set(value);
}
