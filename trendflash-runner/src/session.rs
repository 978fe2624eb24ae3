//! A trading session: trend source, decision engine, and the outputs it feeds.
//!
//! Both drivers own exactly one session and push candles through it, first
//! with [`Session::warm_up`] (indicators only) and then [`Session::step`]
//! (indicators plus a decision pass).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use trendflash_core::domain::{Candle, PositionSide, Resolution, TradeRecord};
use trendflash_core::engine::{
    Decision, DecisionEngine, EngineEvent, EngineState, SignalSink, WarmupState,
};
use trendflash_core::indicators::TrendSource;

use crate::config::StrategyConfig;
use crate::error::RunError;
use crate::notify::{close_message, open_message, report_message, Notifier};

/// Entry half of a trade that is still open.
#[derive(Debug, Clone, Copy)]
struct OpenTrade {
    side: PositionSide,
    time: DateTime<Utc>,
    price: f64,
    balance: f64,
}

pub struct Session {
    tag: String,
    resolution: Resolution,
    trend_source: Box<dyn TrendSource>,
    engine: DecisionEngine,
    state: EngineState,
    warmup: WarmupState,
    sink: Option<Box<dyn SignalSink>>,
    notifier: Option<Arc<dyn Notifier>>,
    open_trade: Option<OpenTrade>,
    trades: Vec<TradeRecord>,
    signal_count: usize,
    candles_decided: usize,
    first_decided: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(config: &StrategyConfig) -> Result<Self, RunError> {
        config.validate()?;
        let trend_source = config.trend_source();
        if config.warm_up_candles < trend_source.lookback() {
            warn!(
                market = %config.market,
                warm_up = config.warm_up_candles,
                lookback = trend_source.lookback(),
                "warm-up is shorter than the indicator lookback, first decisions see warming readings"
            );
        }
        Ok(Self {
            tag: format!("supertrend:{}", config.market),
            resolution: config.resolution()?,
            trend_source: Box::new(trend_source),
            engine: DecisionEngine::new(config.market.clone(), config.reentry_guard),
            state: EngineState::new(config.initial_balance)?,
            warmup: WarmupState::new(config.warm_up_candles),
            sink: None,
            notifier: None,
            open_trade: None,
            trades: Vec::new(),
            signal_count: 0,
            candles_decided: 0,
            first_decided: None,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn SignalSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the default Supertrend pair.
    pub fn with_trend_source(mut self, source: Box<dyn TrendSource>) -> Self {
        self.trend_source = source;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<TradeRecord> {
        self.trades
    }

    pub fn signal_count(&self) -> usize {
        self.signal_count
    }

    pub fn candles_decided(&self) -> usize {
        self.candles_decided
    }

    pub fn warmup(&self) -> &WarmupState {
        &self.warmup
    }

    /// Feed a candle to the indicators without deciding.
    pub fn warm_up(&mut self, candle: &Candle) {
        let reading = self.trend_source.update(candle);
        self.warmup.process_candle();
        debug!(tag = %self.tag, %candle, ?reading, "warm-up candle");
    }

    /// Update the indicators, run one decision pass, and forward its output.
    pub fn step(&mut self, candle: &Candle) -> Result<Decision, RunError> {
        let reading = self.trend_source.update(candle);
        debug!(tag = %self.tag, %candle, ?reading, "candle received");

        let state = self.state.clone();
        let (state, decision) = self.engine.decide(candle, reading, state)?;
        self.state = state;
        self.candles_decided += 1;
        let first = *self.first_decided.get_or_insert(candle.open_time);
        let runtime = candle.open_time + self.resolution.duration() - first;

        for event in &decision.events {
            self.record(candle, *event, runtime);
        }
        self.forward(&decision);

        info!(
            tag = %self.tag,
            balance = self.state.balance,
            roi_pct = self.state.roi() * 100.0,
            "balance"
        );
        Ok(decision)
    }

    fn record(&mut self, candle: &Candle, event: EngineEvent, runtime: chrono::Duration) {
        match event {
            EngineEvent::Opened {
                side,
                price,
                reason,
            } => {
                let balance = self
                    .state
                    .position
                    .map_or(self.state.balance, |p| p.open_balance);
                self.open_trade = Some(OpenTrade {
                    side,
                    time: candle.open_time,
                    price,
                    balance,
                });
                self.notify(&open_message(side, price, reason));
            }
            EngineEvent::Closed {
                side,
                price,
                reason,
                return_fraction,
            } => {
                if let Some(open) = self.open_trade.take() {
                    let trade = TradeRecord {
                        side: open.side,
                        entry_time: open.time,
                        entry_price: open.price,
                        entry_balance: open.balance,
                        exit_time: candle.open_time,
                        exit_price: price,
                        exit_reason: reason,
                        return_fraction,
                    };
                    debug!(
                        tag = %self.tag,
                        pnl = trade.pnl(),
                        held_secs = trade.holding_time().num_seconds(),
                        "trade closed"
                    );
                    self.trades.push(trade);
                }
                self.notify(&close_message(side, price, reason, return_fraction));
                self.notify(&report_message(
                    runtime,
                    self.state.initial_balance,
                    self.state.balance,
                ));
            }
        }
    }

    fn forward(&mut self, decision: &Decision) {
        self.signal_count += decision.signals.len();
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        for signal in &decision.signals {
            if let Err(e) = sink.send(signal.clone()) {
                warn!(tag = %self.tag, error = %e, "signal sink unavailable, dropping further signals");
                self.sink = None;
                return;
            }
        }
    }

    fn notify(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.broadcast(&self.tag, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::mpsc;
    use trendflash_core::domain::{SignalReason, SignalSide};
    use trendflash_core::indicators::TrendReading;

    use crate::notify::MemoryNotifier;

    /// Trend fixed at 100, stop fixed at 90, ready from the first candle.
    struct FixedTrend;

    impl TrendSource for FixedTrend {
        fn update(&mut self, _candle: &Candle) -> TrendReading {
            TrendReading::ready(100.0, 90.0)
        }

        fn lookback(&self) -> usize {
            0
        }
    }

    fn candle(i: i64, close: f64) -> Candle {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(5 * i);
        Candle::new(t, close, close + 1.0, close - 1.0, close, 1.0)
    }

    fn session() -> Session {
        let config = StrategyConfig {
            initial_balance: 1000.0,
            ..StrategyConfig::default()
        };
        Session::new(&config)
            .unwrap()
            .with_trend_source(Box::new(FixedTrend))
    }

    #[test]
    fn records_trades_and_notifies() {
        let notifier = Arc::new(MemoryNotifier::default());
        let mut s = session().with_notifier(notifier.clone());
        for (i, close) in [100.0, 105.0, 95.0, 110.0].into_iter().enumerate() {
            s.step(&candle(i as i64, close)).unwrap();
        }

        assert_eq!(s.signal_count(), 5);
        assert_eq!(s.candles_decided(), 4);
        assert_eq!(s.trades().len(), 2);
        assert_eq!(s.trades()[0].side, PositionSide::Long);
        assert_eq!(s.trades()[0].exit_reason, SignalReason::TrendReversal);
        assert_eq!(s.trades()[1].side, PositionSide::Short);
        assert_eq!(s.trades()[1].exit_reason, SignalReason::Stop);
        assert_eq!(s.trades()[1].entry_balance, s.trades()[0].entry_balance * (1.0 + s.trades()[0].return_fraction));

        let messages: Vec<String> = notifier.messages().into_iter().map(|(_, m)| m).collect();
        assert_eq!(messages[0], "start long @ 105.00 due to trend");
        assert!(messages[1].starts_with("close long @ 95.00 due to trend-reversal\nROI: "));
        assert!(messages[2].starts_with("Report\nRuntime: 15m\n"));
        assert_eq!(messages[3], "start short @ 95.00 due to trend");
        assert!(messages[4].starts_with("close short @ 110.00 due to stop"));
        assert_eq!(messages.len(), 7);
    }

    #[test]
    fn forwards_signals_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut s = session().with_sink(Box::new(tx));
        for (i, close) in [105.0, 95.0].into_iter().enumerate() {
            s.step(&candle(i as i64, close)).unwrap();
        }
        drop(s);
        let got: Vec<(SignalSide, SignalReason)> = rx.iter().map(|sig| (sig.side, sig.reason)).collect();
        assert_eq!(
            got,
            vec![
                (SignalSide::Long, SignalReason::TrendEntry),
                (SignalSide::Close, SignalReason::TrendReversal),
                (SignalSide::Short, SignalReason::TrendEntry),
            ]
        );
    }

    #[test]
    fn disconnected_sink_is_not_fatal() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut s = session().with_sink(Box::new(tx));
        s.step(&candle(0, 105.0)).unwrap();
        s.step(&candle(1, 95.0)).unwrap();
        assert_eq!(s.signal_count(), 3);
        assert_eq!(s.state().position.unwrap().side, PositionSide::Short);
    }

    #[test]
    fn warm_up_never_decides() {
        let mut s = session();
        for i in 0..5 {
            s.warm_up(&candle(i, 150.0));
        }
        assert_eq!(s.warmup().candles_processed(), 5);
        assert_eq!(s.candles_decided(), 0);
        assert!(s.state().is_flat());
    }
}
