/// Warm-up tracker: counts candles fed to the indicators before decisions start.
#[derive(Debug, Clone)]
pub struct WarmupState {
    warmup_candles: usize,
    candles_processed: usize,
}

impl WarmupState {
    pub fn new(warmup_candles: usize) -> Self {
        Self {
            warmup_candles,
            candles_processed: 0,
        }
    }

    pub fn process_candle(&mut self) {
        self.candles_processed += 1;
    }

    pub fn candles_until_warm(&self) -> usize {
        self.warmup_candles.saturating_sub(self.candles_processed)
    }

    pub fn candles_processed(&self) -> usize {
        self.candles_processed
    }

    /// Whether `available` candles are enough to warm up and still decide on one.
    pub fn has_enough_history(&self, available: usize) -> bool {
        available > self.warmup_candles
    }
}
