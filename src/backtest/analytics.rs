//! Backtest analytics and reporting

use super::{Outcome, Trade};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-ticker breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerStats {
    pub ticker: String,
    pub trades: usize,
    pub wins: usize,
    /// Sum of percent gains
    pub total_return: Decimal,
}

/// Summary statistics recomputed from a ledger snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    /// Total number of trades
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub neutrals: usize,
    /// Wins over total, in percent
    pub win_rate: Decimal,
    /// Mean percent gain over winning trades
    pub avg_gain: Decimal,
    /// Mean percent gain over losing trades
    pub avg_loss: Decimal,
    /// Mean percent gain over all trades
    pub avg_trade: Decimal,
    /// Sum of percent gains
    pub total_return: Decimal,
    /// Compounded return as a fraction
    pub cumulative_return: Decimal,
    /// Largest peak-to-trough decline of the equity curve, as a fraction
    pub max_drawdown: Decimal,
    /// Tickers ordered by total return, then name
    pub by_ticker: Vec<TickerStats>,
}

/// Equity after one trade, starting from 1.0
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub ticker: String,
    pub equity: Decimal,
}

/// Compound trades in the given order
pub fn equity_curve(trades: &[Trade]) -> Vec<EquityPoint> {
    let mut equity = Decimal::ONE;
    trades
        .iter()
        .map(|trade| {
            let factor = Decimal::ONE + trade.percent_gain / dec!(100);
            equity = equity.checked_mul(factor).unwrap_or(Decimal::MAX);
            EquityPoint {
                date: trade.date,
                ticker: trade.ticker.clone(),
                equity,
            }
        })
        .collect()
}

/// Reduce an ordered trade sequence to summary statistics.
///
/// Pure; an empty slice yields all-zero stats. Compounding follows slice
/// order, so callers pass a ledger snapshot.
pub fn summarize(trades: &[Trade]) -> SummaryStats {
    let total_trades = trades.len();
    if total_trades == 0 {
        return SummaryStats::default();
    }

    let gains_for = |outcome: Outcome| -> Vec<Decimal> {
        trades
            .iter()
            .filter(|t| t.outcome == outcome)
            .map(|t| t.percent_gain)
            .collect()
    };
    let win_gains = gains_for(Outcome::Win);
    let loss_gains = gains_for(Outcome::Loss);
    let neutrals = total_trades - win_gains.len() - loss_gains.len();

    let total_return: Decimal = trades.iter().map(|t| t.percent_gain).sum();

    let curve = equity_curve(trades);
    let final_equity = curve.last().map_or(Decimal::ONE, |p| p.equity);

    SummaryStats {
        total_trades,
        wins: win_gains.len(),
        losses: loss_gains.len(),
        neutrals,
        win_rate: Decimal::from(win_gains.len()) / Decimal::from(total_trades) * dec!(100),
        avg_gain: mean(&win_gains),
        avg_loss: mean(&loss_gains),
        avg_trade: total_return / Decimal::from(total_trades),
        total_return,
        cumulative_return: final_equity - Decimal::ONE,
        max_drawdown: max_drawdown(&curve),
        by_ticker: ticker_breakdown(trades),
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

fn max_drawdown(curve: &[EquityPoint]) -> Decimal {
    let mut peak = Decimal::ONE;
    let mut worst = Decimal::ZERO;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        let drawdown = (peak - point.equity) / peak;
        if drawdown > worst {
            worst = drawdown;
        }
    }
    worst
}

fn ticker_breakdown(trades: &[Trade]) -> Vec<TickerStats> {
    let mut by_ticker: BTreeMap<&str, TickerStats> = BTreeMap::new();
    for trade in trades {
        let entry = by_ticker
            .entry(trade.ticker.as_str())
            .or_insert_with(|| TickerStats {
                ticker: trade.ticker.clone(),
                trades: 0,
                wins: 0,
                total_return: Decimal::ZERO,
            });
        entry.trades += 1;
        if trade.outcome == Outcome::Win {
            entry.wins += 1;
        }
        entry.total_return += trade.percent_gain;
    }

    let mut stats: Vec<TickerStats> = by_ticker.into_values().collect();
    stats.sort_by(|a, b| {
        b.total_return
            .cmp(&a.total_return)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    stats
}

impl SummaryStats {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let mut table = format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Total Return:      {:+.2}%
Cumulative Return: {:+.2}%
Max Drawdown:      {:.2}%
Win Rate:          {:.1}%
Average Gain:      {:+.2}%
Average Loss:      {:+.2}%
Average Trade:     {:+.2}%

ACTIVITY
───────────────────────────────────────────────────────
Total Trades:      {}
Wins:              {}
Losses:            {}
Neutral:           {}
"#,
            self.total_return,
            self.cumulative_return * dec!(100),
            self.max_drawdown * dec!(100),
            self.win_rate,
            self.avg_gain,
            self.avg_loss,
            self.avg_trade,
            self.total_trades,
            self.wins,
            self.losses,
            self.neutrals,
        );

        if !self.by_ticker.is_empty() {
            table.push_str(
                "\nTOP TICKERS\n───────────────────────────────────────────────────────\n",
            );
            for stats in self.by_ticker.iter().take(10) {
                table.push_str(&format!(
                    "{:<8} {:>4} trades  {:>4} wins  {:+.2}%\n",
                    stats.ticker, stats.trades, stats.wins, stats.total_return
                ));
            }
        }
        table.push_str("══════════════════════════════════════════════════════\n");
        table
    }
}
