//! Backtest driver over CSV and synthetic candle sources.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use trendflash_core::data::{write_candles, CandleSource, CsvCandleSource, SyntheticSource};
use trendflash_core::domain::{Candle, Resolution};
use trendflash_runner::{
    run_backtest, run_backtest_from_source, MemoryNotifier, RunError, StrategyConfig,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
}

fn synthetic(days: i64) -> Vec<Candle> {
    SyntheticSource::with_seed(11)
        .fetch(
            "BTCUSDT",
            Resolution::from_secs(300).unwrap(),
            t0(),
            t0() + chrono::Duration::days(days),
        )
        .unwrap()
}

#[test]
fn csv_and_in_memory_runs_agree() {
    let candles = synthetic(2);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_candles(file.as_file_mut(), &candles).unwrap();

    let config = StrategyConfig::default();
    let from_memory = run_backtest(&config, &candles, None).unwrap();
    let from_csv = run_backtest_from_source(
        &config,
        &CsvCandleSource::new(file.path()),
        t0(),
        t0() + chrono::Duration::days(2),
        None,
    )
    .unwrap();

    assert_eq!(from_csv.candle_count, candles.len());
    assert_eq!(from_csv.trades.len(), from_memory.trades.len());
    assert!((from_csv.final_balance - from_memory.final_balance).abs() < 1e-6);
}

#[test]
fn insufficient_history_aborts_before_deciding() {
    let config = StrategyConfig::default();
    let candles: Vec<Candle> = synthetic(1).into_iter().take(40).collect();
    let notifier = Arc::new(MemoryNotifier::default());

    let err = run_backtest(&config, &candles, Some(notifier.clone())).unwrap_err();
    assert!(matches!(
        err,
        RunError::InsufficientHistory { needed: 40, available: 40 }
    ));
    assert!(notifier.messages().is_empty());
}

#[test]
fn notifications_follow_trades() {
    let config = StrategyConfig::default();
    let notifier = Arc::new(MemoryNotifier::default());
    let report = run_backtest(&config, &synthetic(3), Some(notifier.clone())).unwrap();

    let messages = notifier.messages();
    let opens = messages.iter().filter(|(_, m)| m.starts_with("start ")).count();
    let closes = messages.iter().filter(|(_, m)| m.starts_with("close ")).count();
    let reports = messages.iter().filter(|(_, m)| m.starts_with("Report\n")).count();

    assert_eq!(closes, report.trades.len());
    assert_eq!(reports, closes);
    assert!(opens == closes || opens == closes + 1);
    assert!(messages.iter().all(|(tag, _)| tag == "supertrend:BTCUSDT"));
}

#[test]
fn report_serializes_to_json() {
    let report = run_backtest(&StrategyConfig::default(), &synthetic(1), None).unwrap();
    let json = serde_json::to_string_pretty(&report).unwrap();
    let back: trendflash_runner::BacktestReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.trades.len(), report.trades.len());
    assert_eq!(back.config_hash, report.config_hash);
    assert!(json.contains("\"config_hash\""));
}

#[test]
fn guard_mode_is_part_of_the_config_hash() {
    let candles = synthetic(5);
    let same = run_backtest(&StrategyConfig::default(), &candles, None).unwrap();
    let persistent = run_backtest(
        &StrategyConfig {
            reentry_guard: trendflash_core::engine::ReentryGuard::UntilNextStop,
            ..StrategyConfig::default()
        },
        &candles,
        None,
    )
    .unwrap();

    assert_eq!(same.candle_count, persistent.candle_count);
    assert_ne!(same.config_hash, persistent.config_hash);
}
