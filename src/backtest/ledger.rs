//! Append-only trade ledger

use super::analytics::{self, EquityPoint, SummaryStats};
use super::Trade;

/// Collected trades.
///
/// Trades may arrive in any order; every read goes through [`Ledger::snapshot`],
/// which orders them by date and then ticker. Statistics are always
/// recomputed from a snapshot, never kept as running totals.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade
    pub fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Record a batch of trades
    pub fn extend(&mut self, trades: impl IntoIterator<Item = Trade>) {
        self.trades.extend(trades);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Trades in chronological order, ticker as tie-break
    pub fn snapshot(&self) -> Vec<Trade> {
        let mut trades = self.trades.clone();
        trades.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        trades
    }

    /// Summary statistics over the current snapshot
    pub fn summarize(&self) -> SummaryStats {
        analytics::summarize(&self.snapshot())
    }

    /// Equity curve over the current snapshot
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        analytics::equity_curve(&self.snapshot())
    }
}
