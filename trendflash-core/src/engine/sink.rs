//! Signal sink: the optional, ordered, blocking hand-off to a downstream trader.

use std::sync::mpsc::{Sender, SyncSender};

use thiserror::Error;

use crate::domain::Signal;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("signal consumer disconnected")]
    Disconnected,
}

/// Accepts signals in emission order.
///
/// Implementations may block; backpressure from a slow consumer stalls the
/// decision loop, which keeps at most one decision in flight.
pub trait SignalSink: Send {
    fn send(&mut self, signal: Signal) -> Result<(), SinkError>;
}

impl SignalSink for SyncSender<Signal> {
    fn send(&mut self, signal: Signal) -> Result<(), SinkError> {
        SyncSender::send(self, signal).map_err(|_| SinkError::Disconnected)
    }
}

impl SignalSink for Sender<Signal> {
    fn send(&mut self, signal: Signal) -> Result<(), SinkError> {
        Sender::send(self, signal).map_err(|_| SinkError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SignalReason, SignalSide};
    use std::sync::mpsc;

    #[test]
    fn sync_sender_preserves_order() {
        let (tx, rx) = mpsc::sync_channel(4);
        let mut sink: Box<dyn SignalSink> = Box::new(tx);
        sink.send(Signal::new("BTCUSDT", SignalSide::Close, SignalReason::TrendReversal))
            .unwrap();
        sink.send(Signal::new("BTCUSDT", SignalSide::Short, SignalReason::TrendEntry))
            .unwrap();
        drop(sink);

        let got: Vec<SignalSide> = rx.iter().map(|s| s.side).collect();
        assert_eq!(got, vec![SignalSide::Close, SignalSide::Short]);
    }

    #[test]
    fn dropped_receiver_reports_disconnect() {
        let (mut tx, rx) = mpsc::sync_channel::<Signal>(1);
        drop(rx);
        let err = SignalSink::send(
            &mut tx,
            Signal::new("BTCUSDT", SignalSide::Long, SignalReason::TrendEntry),
        )
        .unwrap_err();
        assert!(matches!(err, SinkError::Disconnected));
    }
}
