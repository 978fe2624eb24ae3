//! trendflash CLI: backtest, live, and download commands.
//!
//! Commands:
//! - `backtest`: replay history (Binance, a CSV file, or synthetic data)
//! - `live`: warm up, then trade the live candle stream until Enter is pressed
//! - `download`: fetch candles from Binance into a CSV file

use std::fs::File;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trendflash_core::data::{
    write_candles, BinanceProvider, CandleSource, CircuitBreaker, CsvCandleSource,
    PollingSubscription, SyntheticSource,
};
use trendflash_core::domain::{Resolution, Signal};
use trendflash_runner::{
    run_backtest_from_source, LiveDriver, LogNotifier, Notifier, StrategyConfig, WebhookNotifier,
};

#[derive(Parser)]
#[command(
    name = "trendflash",
    about = "trendflash: Supertrend signal engine for crypto candles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay historical candles through the strategy.
    Backtest {
        /// Path to a TOML strategy config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start (YYYY-MM-DD or RFC 3339). Defaults to 30 days before --end.
        #[arg(long)]
        start: Option<String>,

        /// End (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Read candles from a CSV file instead of Binance.
        #[arg(long, conflicts_with = "synthetic")]
        csv: Option<PathBuf>,

        /// Use seeded synthetic candles instead of Binance.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Write the report as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Send notifications to this webhook URL.
        #[arg(long)]
        webhook: Option<String>,
    },
    /// Warm up from recent history, then trade live candles.
    Live {
        /// Path to a TOML strategy config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Send notifications to this webhook URL.
        #[arg(long)]
        webhook: Option<String>,

        /// Attach a signal consumer that logs every signal.
        #[arg(long, default_value_t = false)]
        signals_log: bool,

        /// Stream synthetic candles instead of Binance.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Download candles from Binance into a CSV file.
    Download {
        #[arg(long, default_value = "BTCUSDT")]
        market: String,

        /// Candle width in seconds.
        #[arg(long, default_value_t = 300)]
        resolution: u64,

        /// Start (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        start: String,

        /// End (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            start,
            end,
            csv,
            synthetic,
            output,
            webhook,
        } => run_backtest_cmd(config, start, end, csv, synthetic, output, webhook),
        Commands::Live {
            config,
            webhook,
            signals_log,
            synthetic,
        } => run_live_cmd(config, webhook, signals_log, synthetic),
        Commands::Download {
            market,
            resolution,
            start,
            end,
            out,
        } => run_download(market, resolution, start, end, out),
    }
}

/// `YYYY-MM-DD` (midnight UTC) or RFC 3339.
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    let t = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid time '{s}': expected YYYY-MM-DD or RFC 3339"))?;
    Ok(t.with_timezone(&Utc))
}

fn load_config(path: Option<PathBuf>) -> Result<StrategyConfig> {
    let config = match path {
        Some(path) => StrategyConfig::from_file(&path)?,
        None => StrategyConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn notifier(webhook: Option<String>) -> Arc<dyn Notifier> {
    match webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    }
}

fn binance() -> BinanceProvider {
    BinanceProvider::new(Arc::new(CircuitBreaker::default_exchange()))
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    csv: Option<PathBuf>,
    synthetic: bool,
    output: Option<PathBuf>,
    webhook: Option<String>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let end = end.as_deref().map(parse_time).transpose()?.unwrap_or_else(Utc::now);
    let start = match start.as_deref() {
        Some(s) => parse_time(s)?,
        None => end - chrono::Duration::days(30),
    };
    if start >= end {
        bail!("--start must be before --end");
    }

    let source: Box<dyn CandleSource> = match (csv, synthetic) {
        (Some(path), _) => Box::new(CsvCandleSource::new(path)),
        (None, true) => Box::new(SyntheticSource::default()),
        (None, false) => Box::new(binance()),
    };

    let report = run_backtest_from_source(
        &config,
        source.as_ref(),
        start,
        end,
        Some(notifier(webhook)),
    )?;

    println!("{report}");

    if let Some(path) = output {
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn run_live_cmd(
    config_path: Option<PathBuf>,
    webhook: Option<String>,
    signals_log: bool,
    synthetic: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let notifier = notifier(webhook);

    let mut consumer = None;
    let sink = if signals_log {
        let (tx, rx) = mpsc::sync_channel::<Signal>(0);
        consumer = Some(
            thread::Builder::new()
                .name("trendflash-signals".into())
                .spawn(move || {
                    for signal in rx {
                        info!(market = %signal.market, side = %signal.side, reason = %signal.reason, "signal");
                    }
                })?,
        );
        Some(tx)
    } else {
        None
    };

    let handle = if synthetic {
        let mut driver = LiveDriver::new(
            config,
            SyntheticSource::default(),
            PollingSubscription::new(SyntheticSource::default()),
        )
        .with_notifier(notifier);
        if let Some(tx) = sink {
            driver = driver.with_sink(Box::new(tx));
        }
        driver.spawn()?
    } else {
        let provider = Arc::new(binance());
        let mut driver = LiveDriver::new(
            config,
            Arc::clone(&provider),
            PollingSubscription::new(provider),
        )
        .with_notifier(notifier);
        if let Some(tx) = sink {
            driver = driver.with_sink(Box::new(tx));
        }
        driver.spawn()?
    };

    println!("Live trading started. Press Enter to stop.");
    let cancel = handle.cancel_flag();
    thread::Builder::new()
        .name("trendflash-stdin".into())
        .spawn(move || {
            let mut line = String::new();
            if let Ok(n) = std::io::stdin().lock().read_line(&mut line) {
                if n > 0 {
                    cancel.store(true, Ordering::Relaxed);
                }
            }
        })?;

    let summary = handle.join()?;
    if let Some(consumer) = consumer {
        let _ = consumer.join();
    }

    println!(
        "candles: {}, trades: {}, balance: {:.2}, total ROI: {:.2}%",
        summary.candles_processed,
        summary.trade_count,
        summary.final_balance,
        summary.total_return * 100.0
    );
    Ok(())
}

fn run_download(
    market: String,
    resolution: u64,
    start: String,
    end: Option<String>,
    out: PathBuf,
) -> Result<()> {
    let Some(resolution) = Resolution::from_secs(resolution) else {
        bail!("--resolution must be > 0");
    };
    let start = parse_time(&start)?;
    let end = end.as_deref().map(parse_time).transpose()?.unwrap_or_else(Utc::now);

    let candles = binance().fetch(&market, resolution, start, end)?;
    let file = File::create(&out).with_context(|| format!("failed to create {}", out.display()))?;
    write_candles(file, &candles)?;

    println!("{} candles for {market} saved to: {}", candles.len(), out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_dates_and_rfc3339() {
        assert_eq!(
            parse_time("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("2024-03-01T12:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()
        );
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn cli_parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "trendflash", "backtest", "--synthetic", "--start", "2024-01-01", "--end", "2024-01-05",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Backtest { synthetic: true, .. }));
    }

    #[test]
    fn csv_conflicts_with_synthetic() {
        assert!(Cli::try_parse_from(["trendflash", "backtest", "--csv", "a.csv", "--synthetic"]).is_err());
    }
}
