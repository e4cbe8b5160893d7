//! Per-run accounting of skipped records

use crate::bar::RejectionReason;
use serde::Serialize;
use std::collections::BTreeMap;

/// A raw record that failed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// Position in the input batch
    pub index: usize,
    pub ticker: Option<String>,
    pub date: Option<String>,
    pub reason: RejectionReason,
}

/// Where every input went.
///
/// Each raw record lands in exactly one bucket: rejected, or (for daily
/// runs) screened out, degenerate, no breakout, below gap threshold,
/// candidate or traded. Intraday runs count valid minute bars outside
/// regular hours in `outside_session`, and sessions in the remaining
/// post-validation buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub records_seen: usize,
    pub sessions_seen: usize,
    pub outside_session: usize,
    pub rejected: BTreeMap<&'static str, usize>,
    pub screened_out: BTreeMap<&'static str, usize>,
    pub degenerate: BTreeMap<&'static str, usize>,
    pub no_breakout: usize,
    pub below_gap_threshold: usize,
    /// Passed screening in feature-extraction runs
    pub candidates: usize,
    pub traded: usize,
    pub rejections: Vec<Rejection>,
}

impl Diagnostics {
    pub fn record_rejection(&mut self, rejection: Rejection) {
        *self.rejected.entry(rejection.reason.code()).or_default() += 1;
        self.rejections.push(rejection);
    }

    pub fn record_screened_out(&mut self, code: &'static str) {
        *self.screened_out.entry(code).or_default() += 1;
    }

    pub fn record_degenerate(&mut self, code: &'static str) {
        *self.degenerate.entry(code).or_default() += 1;
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn total_screened_out(&self) -> usize {
        self.screened_out.values().sum()
    }

    pub fn total_degenerate(&self) -> usize {
        self.degenerate.values().sum()
    }

    /// Records or sessions that reached a terminal bucket after validation
    pub fn total_evaluated(&self) -> usize {
        self.total_screened_out()
            + self.total_degenerate()
            + self.no_breakout
            + self.below_gap_threshold
            + self.candidates
            + self.traded
    }

    /// One-line summary for logs
    pub fn format_line(&self) -> String {
        format!(
            "seen={} rejected={} screened_out={} degenerate={} no_breakout={} below_gap={} traded={}",
            self.records_seen,
            self.total_rejected(),
            self.total_screened_out(),
            self.total_degenerate(),
            self.no_breakout,
            self.below_gap_threshold,
            self.traded,
        )
    }
}
