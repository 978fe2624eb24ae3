//! Backtest driver: replay a bounded candle history through a session.
//!
//! The first `warm_up_candles` candles only prime the indicators; every
//! later candle gets a decision pass. No signal sink is attached.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use trendflash_core::data::CandleSource;
use trendflash_core::domain::{Candle, TradeRecord};

use crate::config::StrategyConfig;
use crate::error::RunError;
use crate::notify::Notifier;
use crate::session::Session;

/// Outcome of a completed backtest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestReport {
    pub market: String,
    pub resolution_secs: u64,
    pub candle_count: usize,
    pub warm_up_candles: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Cumulative return as a fraction of the initial balance.
    pub total_return: f64,
    pub trades: Vec<TradeRecord>,
    pub signal_count: usize,
    pub config_hash: String,
}

impl BacktestReport {
    pub fn win_rate(&self) -> Option<f64> {
        if self.trades.is_empty() {
            return None;
        }
        let winners = self.trades.iter().filter(|t| t.is_winner()).count();
        Some(winners as f64 / self.trades.len() as f64)
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "market:        {}", self.market)?;
        writeln!(f, "resolution:    {}s", self.resolution_secs)?;
        writeln!(
            f,
            "candles:       {} ({} warm-up)",
            self.candle_count, self.warm_up_candles
        )?;
        writeln!(f, "init balance:  {:.2}", self.initial_balance)?;
        writeln!(f, "final balance: {:.2}", self.final_balance)?;
        writeln!(f, "total ROI:     {:.2}%", self.total_return * 100.0)?;
        write!(f, "trades:        {}", self.trades.len())?;
        if let Some(rate) = self.win_rate() {
            write!(f, " ({:.1}% winners)", rate * 100.0)?;
        }
        write!(f, "\nconfig hash:   {}", self.config_hash)
    }
}

/// Replay `candles` (oldest first) through a fresh session.
///
/// Fails with [`RunError::InsufficientHistory`] before touching any state
/// unless there are strictly more candles than the warm-up count.
pub fn run_backtest(
    config: &StrategyConfig,
    candles: &[Candle],
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<BacktestReport, RunError> {
    let mut session = Session::new(config)?;
    if let Some(notifier) = notifier {
        session = session.with_notifier(notifier);
    }

    if !session.warmup().has_enough_history(candles.len()) {
        return Err(RunError::InsufficientHistory {
            needed: config.warm_up_candles,
            available: candles.len(),
        });
    }

    let (warm, live) = candles.split_at(config.warm_up_candles);
    for candle in warm {
        session.warm_up(candle);
    }
    info!(tag = session.tag(), candles = live.len(), "start backtesting");
    for candle in live {
        session.step(candle)?;
    }

    let state = session.state().clone();
    info!(
        tag = session.tag(),
        balance = state.balance,
        roi_pct = state.roi() * 100.0,
        "backtest finished"
    );

    let signal_count = session.signal_count();
    Ok(BacktestReport {
        market: config.market.clone(),
        resolution_secs: config.resolution_secs,
        candle_count: candles.len(),
        warm_up_candles: config.warm_up_candles,
        initial_balance: state.initial_balance,
        final_balance: state.balance,
        total_return: state.roi(),
        trades: session.into_trades(),
        signal_count,
        config_hash: config.config_hash(),
    })
}

/// Fetch `[start, end]` from `source` and backtest it.
pub fn run_backtest_from_source(
    config: &StrategyConfig,
    source: &dyn CandleSource,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<BacktestReport, RunError> {
    config.validate()?;
    let resolution = config.resolution()?;
    info!(
        market = %config.market,
        %resolution,
        source = source.name(),
        %start,
        %end,
        "loading candles"
    );
    let candles = source.fetch(&config.market, resolution, start, end)?;
    run_backtest(config, &candles, notifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendflash_core::data::SyntheticSource;
    use chrono::TimeZone;

    fn small_config() -> StrategyConfig {
        StrategyConfig {
            warm_up_candles: 20,
            initial_balance: 1000.0,
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn too_few_candles_is_rejected() {
        let config = small_config();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = SyntheticSource::default()
            .fetch("BTCUSDT", config.resolution().unwrap(), t0, t0 + chrono::Duration::minutes(5 * 19))
            .unwrap();
        assert_eq!(candles.len(), 20);
        let err = run_backtest(&config, &candles, None).unwrap_err();
        assert!(matches!(
            err,
            RunError::InsufficientHistory { needed: 20, available: 20 }
        ));
    }

    #[test]
    fn report_is_consistent_with_trades() {
        let config = small_config();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let report = run_backtest_from_source(
            &config,
            &SyntheticSource::default(),
            t0,
            t0 + chrono::Duration::days(3),
            None,
        )
        .unwrap();

        assert_eq!(report.candle_count, 3 * 288 + 1);
        assert!(!report.trades.is_empty());
        let compounded = report
            .trades
            .iter()
            .fold(report.initial_balance, |b, t| b * (1.0 + t.return_fraction));
        assert!((compounded - report.final_balance).abs() < 1e-6 * report.initial_balance);
        assert!(report.signal_count >= report.trades.len() * 2);
        assert_eq!(report.config_hash, config.config_hash());
        assert!(report.to_string().contains("total ROI:"));
    }
}
