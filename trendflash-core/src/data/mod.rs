//! Candle sources: exchange REST, CSV files, synthetic data, and the live poller.

pub mod binance;
pub mod circuit_breaker;
pub mod csv_source;
pub mod poller;
pub mod provider;
pub mod synthetic;

pub use binance::BinanceProvider;
pub use circuit_breaker::CircuitBreaker;
pub use csv_source::{write_candles, CsvCandleSource};
pub use poller::{Clock, PollingSubscription};
pub use provider::{check_ordering, CandleSource, CandleSubscription, DataError};
pub use synthetic::SyntheticSource;
