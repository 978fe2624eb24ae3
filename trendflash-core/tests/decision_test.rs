//! Decision engine scenarios, driven candle by candle with scripted trend readings.

use chrono::{TimeZone, Utc};
use trendflash_core::domain::{Candle, PositionSide, SignalReason, SignalSide};
use trendflash_core::engine::{DecisionEngine, EngineEvent, EngineState, ReentryGuard};
use trendflash_core::indicators::{IndicatorValue, TrendReading};

fn candles(closes: &[f64]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                base + chrono::Duration::minutes(5 * i as i64),
                close,
                close + 1.0,
                close - 1.0,
                close,
                100.0,
            )
        })
        .collect()
}

fn signal_sides(signals: &[trendflash_core::domain::Signal]) -> Vec<(SignalSide, SignalReason)> {
    signals.iter().map(|s| (s.side, s.reason)).collect()
}

#[test]
fn constant_trend_scenario() {
    // closes [100, 105, 95, 110], trend 100, stop 90
    let engine = DecisionEngine::new("BTCUSDT", ReentryGuard::SameCandle);
    let reading = TrendReading::ready(100.0, 90.0);
    let mut state = EngineState::new(1000.0).unwrap();
    let mut per_candle = Vec::new();

    for candle in candles(&[100.0, 105.0, 95.0, 110.0]) {
        let (next, decision) = engine.decide(&candle, reading, state).unwrap();
        per_candle.push(signal_sides(&decision.signals));
        state = next;
    }

    // 100 is neither above nor below 100
    assert_eq!(per_candle[0], vec![]);
    // 105 > 100: open long
    assert_eq!(per_candle[1], vec![(SignalSide::Long, SignalReason::TrendEntry)]);
    // 95 > stop 90 so no stop; 95 < 100 reverses to short
    assert_eq!(
        per_candle[2],
        vec![
            (SignalSide::Close, SignalReason::TrendReversal),
            (SignalSide::Short, SignalReason::TrendEntry),
        ]
    );
    // short stop: 110 >= 90; then flat and 110 > 100 opens long (guard only blocks short)
    assert_eq!(
        per_candle[3],
        vec![
            (SignalSide::Close, SignalReason::Stop),
            (SignalSide::Long, SignalReason::TrendEntry),
        ]
    );

    let expected = 1000.0 * (1.0 + (95.0 - 105.0) / 105.0) * (1.0 + (95.0 - 110.0) / 95.0);
    assert!((state.balance - expected).abs() < 1e-9);
    assert_eq!(state.position.unwrap().side, PositionSide::Long);
    assert_eq!(state.previous_closed_side, Some(PositionSide::Short));
}

#[test]
fn same_bar_guard_blocks_only_the_stopped_side() {
    let engine = DecisionEngine::new("BTCUSDT", ReentryGuard::SameCandle);
    let candle = candles(&[100.0])[0];
    let long_open = || {
        let mut s = EngineState::new(1000.0).unwrap();
        s.position = Some(trendflash_core::domain::Position::open(
            PositionSide::Long,
            1000.0,
            102.0,
        ));
        s
    };

    // Stop 101 fires (100 <= 101); trend 95 is bullish: no new long
    let (state, decision) = engine
        .decide(&candle, TrendReading::ready(95.0, 101.0), long_open())
        .unwrap();
    assert_eq!(
        signal_sides(&decision.signals),
        vec![(SignalSide::Close, SignalReason::Stop)]
    );
    assert!(state.position.is_none());
    assert_eq!(state.previous_closed_side, Some(PositionSide::Long));

    // Stop fires; trend 105 is bearish: short opens
    let (state, decision) = engine
        .decide(&candle, TrendReading::ready(105.0, 101.0), long_open())
        .unwrap();
    assert_eq!(
        signal_sides(&decision.signals),
        vec![
            (SignalSide::Close, SignalReason::Stop),
            (SignalSide::Short, SignalReason::TrendEntry),
        ]
    );
    assert_eq!(state.position.unwrap().side, PositionSide::Short);
}

#[test]
fn reversal_emits_close_then_open() {
    let engine = DecisionEngine::new("ETHUSDT", ReentryGuard::SameCandle);
    let cs = candles(&[110.0, 90.0]);
    let state = EngineState::new(500.0).unwrap();

    let (state, _) = engine.decide(&cs[0], TrendReading::ready(100.0, 50.0), state).unwrap();
    let (state, decision) = engine
        .decide(&cs[1], TrendReading::ready(100.0, 50.0), state)
        .unwrap();

    assert_eq!(decision.signals.len(), 2);
    assert_eq!(decision.signals[0].side, SignalSide::Close);
    assert_eq!(decision.signals[0].reason, SignalReason::TrendReversal);
    assert_eq!(decision.signals[1].side, SignalSide::Short);
    assert!(decision.signals.iter().all(|s| s.market == "ETHUSDT"));
    assert!(matches!(
        decision.events[0],
        EngineEvent::Closed { side: PositionSide::Long, .. }
    ));
    assert_eq!(state.position.unwrap().open_price, 90.0);
}

#[test]
fn warm_up_candles_change_nothing() {
    let engine = DecisionEngine::new("BTCUSDT", ReentryGuard::UntilNextStop);
    let mut state = EngineState::new(1000.0).unwrap();
    state.previous_closed_side = Some(PositionSide::Long);
    let before = state.clone();

    for candle in candles(&[50.0, 500.0, 5.0]) {
        let reading = TrendReading::new(IndicatorValue::WarmingUp, IndicatorValue::Ready(1.0));
        let (next, decision) = engine.decide(&candle, reading, state).unwrap();
        assert!(decision.is_empty());
        state = next;
    }
    assert_eq!(state, before);
}
