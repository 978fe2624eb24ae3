//! trendflash runner: configuration, sessions, and the two drivers.
//!
//! This crate builds on `trendflash-core` to provide:
//! - TOML strategy configuration with validation and content hashing
//! - A trading session wiring trend source, decision engine, sink, and notifier
//! - The backtest driver and its report
//! - The live driver (warm-up, subscription thread, cancellable decision loop)
//! - Log and webhook notifiers

pub mod backtest;
pub mod config;
pub mod error;
pub mod live;
pub mod notify;
pub mod session;

pub use backtest::{run_backtest, run_backtest_from_source, BacktestReport};
pub use config::{ConfigError, StrategyConfig};
pub use error::RunError;
pub use live::{warm_up_window, LiveDriver, LiveHandle, LiveSummary};
pub use notify::{LogNotifier, MemoryNotifier, Notifier, WebhookNotifier};
pub use session::Session;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn driver_types_cross_threads() {
        assert_send::<Session>();
        assert_send::<RunError>();
        assert_send::<LiveSummary>();
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
        assert_send::<LogNotifier>();
        assert_sync::<WebhookNotifier>();
        assert_sync::<MemoryNotifier>();
    }
}
