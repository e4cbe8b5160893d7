//! Pipeline behavior across validation, screening, simulation and the ledger

use gapgo::backtest::{
    equity_curve, summarize, BacktestRunner, Ledger, Outcome, Simulation, StrategyConfig,
    TradeSimulator,
};
use gapgo::bar::{validate, BarRecord, RawBar};
use gapgo::config::Config;
use gapgo::screen::{passes, ScreeningCriteria, ScreeningMode};
use gapgo::source::NewsIndex;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> BarRecord {
    BarRecord {
        date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        timestamp: None,
        ticker: "ABCD".to_string(),
        open,
        high,
        low,
        close,
        volume: 2_000_000,
        prev_close: Some(dec!(9)),
    }
}

fn worked_example_strategy() -> StrategyConfig {
    StrategyConfig {
        gap_threshold: None,
        entry_buffer: dec!(0.01),
        target_percent: dec!(0.05),
        stop_percent: dec!(0.03),
        commission_rate: Decimal::ZERO,
    }
}

fn criteria() -> ScreeningCriteria {
    ScreeningCriteria {
        min_price: dec!(1),
        max_price: dec!(100),
        min_volume: 1_000_000,
        min_percent_change: dec!(5),
        ..Default::default()
    }
}

#[test]
fn test_worked_example_resolves_stop_first() {
    let simulator = TradeSimulator::new(worked_example_strategy()).unwrap();
    let levels = simulator.levels(dec!(10));
    assert_eq!(levels.breakout_entry, dec!(10.10));
    assert_eq!(levels.target_price, dec!(10.605));
    assert_eq!(levels.stop_price, dec!(9.797));

    let result = simulator
        .simulate_daily(&bar(dec!(10), dec!(11), dec!(9.5), dec!(10.2)))
        .unwrap();
    let Simulation::Filled(trade) = result else {
        panic!("expected a trade, got {:?}", result);
    };
    assert_eq!(trade.outcome, Outcome::Loss);
    assert_eq!(trade.exit_price, dec!(9.797));
    assert_eq!(trade.percent_gain, dec!(-3));
}

#[test]
fn test_exit_prices_follow_outcome() {
    let simulator = TradeSimulator::new(worked_example_strategy()).unwrap();
    let levels = simulator.levels(dec!(10));
    let cases = [
        (bar(dec!(10), dec!(11), dec!(9.9), dec!(10.8)), Outcome::Win, levels.target_price),
        (bar(dec!(10), dec!(10.3), dec!(9.5), dec!(10.2)), Outcome::Loss, levels.stop_price),
        (bar(dec!(10), dec!(10.3), dec!(9.9), dec!(10.2)), Outcome::Neutral, dec!(10.2)),
    ];

    for (input, outcome, exit) in cases {
        match simulator.simulate_daily(&input).unwrap() {
            Simulation::Filled(trade) => {
                assert_eq!(trade.outcome, outcome);
                assert_eq!(trade.exit_price, exit);
            }
            other => panic!("expected a trade, got {:?}", other),
        }
    }
}

#[test]
fn test_screening_examples() {
    let mut passing = bar(dec!(10), dec!(12), dec!(10), dec!(12));
    assert!(passes(&passing, &criteria(), false));

    passing.volume = 1_000_000;
    assert!(!passes(&passing, &criteria(), false));

    let gap_criteria = ScreeningCriteria {
        mode: ScreeningMode::GapPercent,
        ..criteria()
    };
    let mut zero_baseline = bar(dec!(10), dec!(12), dec!(10), dec!(12));
    zero_baseline.prev_close = None;
    assert!(!passes(&zero_baseline, &gap_criteria, false));

    let fallback = ScreeningCriteria {
        allow_zero_baseline: true,
        min_percent_change: dec!(-1),
        ..gap_criteria
    };
    assert!(passes(&zero_baseline, &fallback, false));
}

#[test]
fn test_validate_is_idempotent_on_valid_bars() {
    let raw: RawBar = serde_json::from_value(json!({
        "ticker": "ABCD", "date": "2024-03-04", "open": "10.00", "high": 11,
        "low": 9.5, "close": 10.2, "volume": 2000000, "prev_close": 9
    }))
    .unwrap();

    let once = validate(&raw).unwrap();
    let twice = validate(&RawBar::from(&once)).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_reordering_changes_equity_path_not_totals() {
    let simulator = TradeSimulator::new(worked_example_strategy()).unwrap();
    let mut win = bar(dec!(10), dec!(11), dec!(9.9), dec!(10.8));
    win.date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let loss = bar(dec!(10), dec!(10.3), dec!(9.5), dec!(10.2));

    let trades: Vec<_> = [win, loss]
        .iter()
        .map(|b| match simulator.simulate_daily(b).unwrap() {
            Simulation::Filled(trade) => trade,
            other => panic!("expected a trade, got {:?}", other),
        })
        .collect();
    let reversed: Vec<_> = trades.iter().rev().cloned().collect();

    assert_eq!(summarize(&trades).total_return, summarize(&reversed).total_return);
    assert_ne!(equity_curve(&trades), equity_curve(&reversed));

    // The ledger sorts before reducing, so append order is irrelevant
    let mut forward = Ledger::new();
    forward.extend(trades);
    let mut backward = Ledger::new();
    backward.extend(reversed);
    assert_eq!(forward.summarize(), backward.summarize());
    assert_eq!(forward.snapshot()[0].outcome, Outcome::Loss);
}

#[tokio::test]
async fn test_shuffled_batches_produce_identical_reports() {
    let mut config = Config::default();
    config.screening.min_percent_change = dec!(1);
    config.strategy = worked_example_strategy();

    let bars: Vec<RawBar> = (0..40)
        .map(|i| {
            let mut input = bar(dec!(10), dec!(10.3) + Decimal::from(i % 5) / dec!(4), dec!(9.5) + Decimal::from(i % 3) / dec!(5), dec!(10.2));
            input.ticker = format!("T{:02}", i % 7);
            input.date = NaiveDate::from_ymd_opt(2024, 3, 1 + (i % 20) as u32).unwrap();
            RawBar::from(&input)
        })
        .collect();
    let mut shuffled = bars.clone();
    shuffled.reverse();
    shuffled.rotate_left(13);

    let runner = BacktestRunner::new(&config).unwrap().with_concurrency(5);
    let a = runner.run(bars, Arc::new(NewsIndex::default())).await.unwrap();
    let b = runner.run(shuffled, Arc::new(NewsIndex::default())).await.unwrap();

    assert_eq!(a.ledger.snapshot(), b.ledger.snapshot());
    assert_eq!(a.summary(), b.summary());
    assert_eq!(
        a.diagnostics.total_rejected() + a.diagnostics.total_evaluated(),
        a.diagnostics.records_seen
    );
}

#[tokio::test]
async fn test_every_malformed_record_is_classified() {
    let config = Config::default();
    let runner = BacktestRunner::new(&config).unwrap();
    let bars: Vec<RawBar> = vec![
        serde_json::from_value(json!({"date": "2024-03-04", "open": 1})).unwrap(),
        serde_json::from_value(json!({"ticker": "A", "date": "04/03/2024"})).unwrap(),
        serde_json::from_value(json!({"ticker": "A", "date": "2024-03-04", "open": 0, "high": 1, "low": 1, "close": 1, "volume": 1})).unwrap(),
        serde_json::from_value(json!({"ticker": "A", "date": "2024-03-04", "open": 1, "high": 1, "low": 1, "close": 1, "volume": -5})).unwrap(),
        RawBar::default(),
    ];

    let report = runner.run(bars, Arc::new(NewsIndex::default())).await.unwrap();
    let codes: Vec<&str> = report
        .diagnostics
        .rejections
        .iter()
        .map(|r| r.reason.code())
        .collect();
    assert_eq!(
        codes,
        vec![
            "MISSING_FIELD",
            "DATE_INVALID",
            "PRICE_RANGE_INVALID",
            "VOLUME_INVALID",
            "MISSING_FIELD"
        ]
    );
}
