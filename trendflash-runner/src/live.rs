//! Live driver: warm up from recent history, then trade a live subscription.
//!
//! Two threads:
//! - the subscription (producer) delivers completed candles over a
//!   rendezvous channel, so it blocks until the decision loop takes each one;
//! - the decision loop (consumer) owns the session and its state.
//!
//! Both watch one shared cancel flag. The consumer polls the channel with a
//! short timeout so cancellation is observed even when no candle arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use trendflash_core::data::{CandleSource, CandleSubscription, Clock};
use trendflash_core::domain::{Candle, Resolution};
use trendflash_core::engine::SignalSink;

use crate::config::{ConfigError, StrategyConfig};
use crate::error::RunError;
use crate::notify::Notifier;
use crate::session::Session;

/// Final numbers of a live run, returned on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveSummary {
    pub candles_processed: usize,
    /// Completed round trips.
    pub trade_count: usize,
    pub final_balance: f64,
    /// Cumulative return as a fraction of the initial balance.
    pub total_return: f64,
}

impl LiveSummary {
    fn from_session(session: &Session) -> Self {
        Self {
            candles_processed: session.candles_decided(),
            trade_count: session.trades().len(),
            final_balance: session.state().balance,
            total_return: session.state().roi(),
        }
    }
}

/// Range of open times to fetch for warm-up at `now`.
///
/// `last` is the start of the bucket in progress; the window holds the
/// `warm_up` completed buckets before it. `None` when the window does not
/// fit the representable time range.
pub fn warm_up_window(
    now: DateTime<Utc>,
    resolution: Resolution,
    warm_up: usize,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let last = resolution.align_down(now);
    let res = resolution.duration();
    let buckets = i32::try_from(warm_up).ok()?.checked_add(1)?;
    let span = res.checked_mul(buckets)?;
    let start = last
        .checked_sub_signed(span)?
        .checked_add_signed(chrono::Duration::seconds(1))?;
    let end = last.checked_sub_signed(res)?;
    Some((start, end))
}

/// Handle to a running live driver.
pub struct LiveHandle {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<Result<LiveSummary, RunError>>,
}

impl LiveHandle {
    /// Ask both threads to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the driver to end on its own (failure or external cancel).
    pub fn join(self) -> Result<LiveSummary, RunError> {
        self.join
            .join()
            .map_err(|_| RunError::ThreadPanicked("decision loop"))?
    }

    /// Cancel and wait.
    pub fn shutdown(self) -> Result<LiveSummary, RunError> {
        self.cancel();
        self.join()
    }
}

pub struct LiveDriver<H, S> {
    config: StrategyConfig,
    history: H,
    subscription: S,
    notifier: Option<Arc<dyn Notifier>>,
    sink: Option<Box<dyn SignalSink>>,
    clock: Clock,
    recv_timeout: Duration,
}

impl<H, S> LiveDriver<H, S>
where
    H: CandleSource + 'static,
    S: CandleSubscription + 'static,
{
    pub fn new(config: StrategyConfig, history: H, subscription: S) -> Self {
        Self {
            config,
            history,
            subscription,
            notifier: None,
            sink: None,
            clock: Arc::new(Utc::now),
            recv_timeout: Duration::from_millis(200),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn SignalSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Clock used for the warm-up window.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Validate the config and start the decision loop on its own thread.
    pub fn spawn(self) -> Result<LiveHandle, RunError> {
        let mut session = Session::new(&self.config)?;
        if let Some(notifier) = self.notifier {
            session = session.with_notifier(notifier);
        }
        if let Some(sink) = self.sink {
            session = session.with_sink(sink);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            config: self.config,
            history: self.history,
            subscription: self.subscription,
            session,
            clock: self.clock,
            recv_timeout: self.recv_timeout,
            cancel: cancel.clone(),
        };
        let join = thread::Builder::new()
            .name("trendflash-live".into())
            .spawn(move || worker.run())?;
        Ok(LiveHandle { cancel, join })
    }
}

struct Worker<H, S> {
    config: StrategyConfig,
    history: H,
    subscription: S,
    session: Session,
    clock: Clock,
    recv_timeout: Duration,
    cancel: Arc<AtomicBool>,
}

impl<H, S> Worker<H, S>
where
    H: CandleSource + 'static,
    S: CandleSubscription + 'static,
{
    fn run(mut self) -> Result<LiveSummary, RunError> {
        let market = self.config.market.clone();
        let resolution = self.config.resolution()?;
        let now = (self.clock)();
        let (start, end) = warm_up_window(now, resolution, self.config.warm_up_candles)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "warm-up window of {} candles before {now} is out of range",
                    self.config.warm_up_candles
                ))
            })?;

        let history = self.history.fetch(&market, resolution, start, end)?;
        for candle in &history {
            self.session.warm_up(candle);
        }
        let missing = self.session.warmup().candles_until_warm();
        if missing > 0 {
            warn!(
                market = %market,
                needed = self.config.warm_up_candles,
                got = history.len(),
                missing,
                "short warm-up history, indicators will finish warming on live candles"
            );
        }
        let after = history.last().map_or(end, |c| c.open_time);
        info!(
            market = %market,
            warm_up = self.session.warmup().candles_processed(),
            %after,
            "warm-up complete, going live"
        );

        let (tx, rx) = mpsc::sync_channel::<Candle>(0);
        let mut subscription = self.subscription;
        let producer_cancel = self.cancel.clone();
        let producer_market = market.clone();
        let producer = thread::Builder::new()
            .name("trendflash-subscription".into())
            .spawn(move || {
                subscription.run(&producer_market, resolution, after, tx, producer_cancel)
            })?;

        let outcome = consume(&mut self.session, &rx, &self.cancel, self.recv_timeout);

        // Unblock a producer parked in `send`, then reap it.
        self.cancel.store(true, Ordering::Relaxed);
        drop(rx);
        let produced = producer
            .join()
            .map_err(|_| RunError::ThreadPanicked("subscription"))?;

        let summary = LiveSummary::from_session(&self.session);
        match outcome {
            Ok(Stop::Cancelled) => {
                info!(
                    market = %market,
                    candles = summary.candles_processed,
                    balance = summary.final_balance,
                    roi_pct = summary.total_return * 100.0,
                    "live driver stopped"
                );
                Ok(summary)
            }
            Ok(Stop::ProducerGone) => {
                let err = match produced {
                    Err(e) => RunError::Data(e),
                    Ok(()) => RunError::SubscriptionEnded,
                };
                error!(market = %market, error = %err, "live subscription ended");
                Err(err)
            }
            Err(e) => {
                error!(market = %market, error = %e, "live decision loop failed");
                Err(e)
            }
        }
    }
}

enum Stop {
    Cancelled,
    ProducerGone,
}

fn consume(
    session: &mut Session,
    rx: &Receiver<Candle>,
    cancel: &AtomicBool,
    timeout: Duration,
) -> Result<Stop, RunError> {
    while !cancel.load(Ordering::Relaxed) {
        match rx.recv_timeout(timeout) {
            Ok(candle) => {
                session.step(&candle)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Ok(if cancel.load(Ordering::Relaxed) {
                    Stop::Cancelled
                } else {
                    Stop::ProducerGone
                });
            }
        }
    }
    Ok(Stop::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn warm_up_window_covers_completed_buckets() {
        let res = Resolution::from_secs(300).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 7, 30).unwrap();
        let (start, end) = warm_up_window(now, res, 40).unwrap();

        // bucket in progress opened at 12:05
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 40, 1).unwrap()
        );
        // open times strictly after start-1s and up to end: exactly 40 buckets
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 45, 0).unwrap();
        assert_eq!((end - first).num_seconds() / 300 + 1, 40);
    }

    #[test]
    fn warm_up_window_rejects_counts_that_overflow() {
        let res = Resolution::from_secs(300).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(warm_up_window(now, res, 4_294_967_296).is_none());

        let widest = Resolution::from_secs(Resolution::MAX_SECS).unwrap();
        let (start, end) = warm_up_window(now, widest, 100_000).unwrap();
        assert!(start <= end);
    }
}
