//! CSV candle files: `open_time,open,high,low,close,volume`, open time in unix seconds.
//!
//! The offline path for backtests; `trendflash download` writes the same format.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::{check_ordering, CandleSource, DataError};
use crate::domain::{Candle, Resolution};

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvRow {
    fn into_candle(self) -> Result<Candle, DataError> {
        let open_time = DateTime::<Utc>::from_timestamp(self.open_time, 0).ok_or_else(|| {
            DataError::Csv(format!("invalid open_time: {}", self.open_time))
        })?;
        Ok(Candle::new(
            open_time,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ))
    }
}

impl From<&Candle> for CsvRow {
    fn from(c: &Candle) -> Self {
        Self {
            open_time: c.open_time.timestamp(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        }
    }
}

/// Candle source backed by one CSV file per market.
///
/// The market argument of `fetch` is ignored; the file is the market.
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    path: PathBuf,
}

impl CsvCandleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every candle in the file, in file order.
    pub fn read_all(&self) -> Result<Vec<Candle>, DataError> {
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| DataError::Csv(format!("{}: {e}", self.path.display())))?;
        reader
            .deserialize::<CsvRow>()
            .map(|row| {
                row.map_err(|e| DataError::Csv(format!("{}: {e}", self.path.display())))?
                    .into_candle()
            })
            .collect()
    }
}

impl CandleSource for CsvCandleSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        _market: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        let candles: Vec<Candle> = self
            .read_all()?
            .into_iter()
            .filter(|c| c.open_time >= start && c.open_time <= end)
            .collect();
        check_ordering(&candles, resolution)?;
        Ok(candles)
    }
}

/// Write candles in the format [`CsvCandleSource`] reads.
pub fn write_candles<W: Write>(writer: W, candles: &[Candle]) -> Result<(), DataError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for candle in candles {
        csv_writer
            .serialize(CsvRow::from(candle))
            .map_err(|e| DataError::Csv(e.to_string()))?;
    }
    csv_writer.flush().map_err(|e| DataError::Csv(e.to_string()))
}
