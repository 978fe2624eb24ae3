//! Live subscription built on a historical candle source.
//!
//! Every poll the subscription works out the most recently *completed*
//! candle bucket. When that bucket is newer than the last delivered candle,
//! it fetches the missing range and sends each completed candle, oldest
//! first. An exchange that has not published the candle yet just yields an
//! empty fetch, which is retried on the next poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::provider::{CandleSource, CandleSubscription, DataError};
use crate::domain::{Candle, Resolution};

/// Wall clock, injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct PollingSubscription<S> {
    source: S,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    clock: Clock,
}

impl<S: CandleSource> PollingSubscription<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            poll_interval: Duration::from_secs(5),
            max_consecutive_failures: 10,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, n: u32) -> Self {
        self.max_consecutive_failures = n.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Open time of the newest bucket that has fully closed at `now`.
    fn last_completed(resolution: Resolution, now: DateTime<Utc>) -> DateTime<Utc> {
        resolution.align_down(now) - resolution.duration()
    }
}

/// Sleep for `total`, waking early if `cancel` is set.
fn sleep_cancellable(total: Duration, cancel: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(50);
    let mut left = total;
    while !left.is_zero() && !cancel.load(Ordering::Relaxed) {
        let step = left.min(SLICE);
        std::thread::sleep(step);
        left = left.saturating_sub(step);
    }
}

impl<S: CandleSource> CandleSubscription for PollingSubscription<S> {
    fn run(
        &mut self,
        market: &str,
        resolution: Resolution,
        after: DateTime<Utc>,
        tx: SyncSender<Candle>,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), DataError> {
        info!(market, %resolution, source = self.source.name(), %after, "subscription started");
        let mut last_delivered = after;
        let mut failures = 0u32;

        while !cancel.load(Ordering::Relaxed) {
            let now = (self.clock)();
            let target = Self::last_completed(resolution, now);

            if target > last_delivered {
                let start = last_delivered + resolution.duration();
                match self.source.fetch(market, resolution, start, target) {
                    Ok(candles) => {
                        failures = 0;
                        for candle in candles {
                            if candle.open_time <= last_delivered || candle.open_time > target {
                                continue;
                            }
                            debug!(market, open_time = %candle.open_time, "delivering candle");
                            let open_time = candle.open_time;
                            if tx.send(candle).is_err() {
                                info!(market, "consumer hung up, subscription stopping");
                                return Ok(());
                            }
                            last_delivered = open_time;
                            if cancel.load(Ordering::Relaxed) {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(market, failures, error = %e, "candle poll failed");
                        if failures >= self.max_consecutive_failures {
                            return Err(DataError::SubscriptionFailed {
                                failures,
                                last: e.to_string(),
                            });
                        }
                    }
                }
            }

            sleep_cancellable(self.poll_interval, &cancel);
        }

        info!(market, "subscription cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticSource;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicI64;
    use std::sync::mpsc;

    fn res() -> Resolution {
        Resolution::from_secs(300).unwrap()
    }

    /// Clock that advances one resolution per call.
    fn stepping_clock(start: DateTime<Utc>) -> Clock {
        let calls = Arc::new(AtomicI64::new(0));
        Arc::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            start + chrono::Duration::seconds(300 * n)
        })
    }

    #[test]
    fn last_completed_is_previous_bucket() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 7, 10).unwrap();
        assert_eq!(
            PollingSubscription::<SyntheticSource>::last_completed(res(), now),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn delivers_consecutive_candles_after_cursor() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 30).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 0, 50, 0).unwrap();
        let mut sub = PollingSubscription::new(SyntheticSource::default())
            .with_poll_interval(Duration::ZERO)
            .with_clock(stepping_clock(start));

        let (tx, rx) = mpsc::sync_channel(0);
        let cancel = Arc::new(AtomicBool::new(false));
        let producer_cancel = cancel.clone();
        let handle = std::thread::spawn(move || {
            sub.run("BTCUSDT", res(), after, tx, producer_cancel)
        });

        let got: Vec<Candle> = rx.iter().take(4).collect();
        cancel.store(true, Ordering::Relaxed);
        drop(rx);
        assert!(handle.join().unwrap().is_ok());

        let expected: Vec<DateTime<Utc>> = (1..=4)
            .map(|i| after + chrono::Duration::seconds(300 * i))
            .collect();
        let times: Vec<DateTime<Utc>> = got.iter().map(|c| c.open_time).collect();
        assert_eq!(times, expected);
    }

    struct FailingSource;

    impl CandleSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn fetch(
            &self,
            _market: &str,
            _resolution: Resolution,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Candle>, DataError> {
            Err(DataError::NetworkUnreachable("offline".into()))
        }
    }

    #[test]
    fn gives_up_after_consecutive_failures() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let mut sub = PollingSubscription::new(FailingSource)
            .with_poll_interval(Duration::ZERO)
            .with_max_consecutive_failures(3)
            .with_clock(Arc::new(move || now));
        let (tx, _rx) = mpsc::sync_channel(0);
        let err = sub
            .run(
                "BTCUSDT",
                res(),
                now - chrono::Duration::hours(1),
                tx,
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap_err();
        assert!(matches!(err, DataError::SubscriptionFailed { failures: 3, .. }));
    }

    #[test]
    fn cancelled_before_start_returns_ok() {
        let mut sub = PollingSubscription::new(SyntheticSource::default());
        let (tx, _rx) = mpsc::sync_channel(0);
        let result = sub.run(
            "BTCUSDT",
            res(),
            Utc::now(),
            tx,
            Arc::new(AtomicBool::new(true)),
        );
        assert!(result.is_ok());
    }
}
