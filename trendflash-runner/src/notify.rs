//! Human-readable notifications about opens, closes, and performance.
//!
//! Notifiers are fire-and-forget: a failed delivery is logged and dropped,
//! never surfaced to the decision loop.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use trendflash_core::domain::{PositionSide, SignalReason};

const SECONDS_PER_YEAR: f64 = 86_400.0 * 365.0;

pub trait Notifier: Send + Sync {
    fn broadcast(&self, tag: &str, message: &str);
}

/// Writes broadcasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn broadcast(&self, tag: &str, message: &str) {
        info!(tag, "{message}");
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    tag: &'a str,
    message: &'a str,
}

/// POSTs `{"tag": ..., "message": ...}` to a webhook URL.
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn broadcast(&self, tag: &str, message: &str) {
        let body = WebhookBody { tag, message };
        match self.client.post(&self.url).json(&body).send() {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(url = %self.url, status = %resp.status(), "webhook rejected notification"),
            Err(e) => warn!(url = %self.url, error = %e, "webhook delivery failed"),
        }
    }
}

/// Keeps every broadcast in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn broadcast(&self, tag: &str, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tag.to_string(), message.to_string()));
    }
}

pub fn open_message(side: PositionSide, price: f64, reason: SignalReason) -> String {
    format!("start {side} @ {price:.2} due to {reason}")
}

pub fn close_message(
    side: PositionSide,
    price: f64,
    reason: SignalReason,
    return_fraction: f64,
) -> String {
    format!(
        "close {side} @ {price:.2} due to {reason}\nROI: {:.2}%",
        return_fraction * 100.0
    )
}

/// Performance summary broadcast after every close.
pub fn report_message(runtime: chrono::Duration, initial_balance: f64, balance: f64) -> String {
    let roi = (balance - initial_balance) / initial_balance;
    let mut msg = String::from("Report\n");
    msg.push_str(&format!("Runtime: {}\n", format_runtime(runtime)));
    msg.push_str(&format!("Init Balance: {initial_balance:.2}\n"));
    msg.push_str(&format!("Balance: {balance:.2}\n"));
    msg.push_str(&format!("ROI: {:.2}%", roi * 100.0));
    let secs = runtime.num_seconds();
    if secs > 0 {
        let annualized = roi * SECONDS_PER_YEAR / secs as f64;
        msg.push_str(&format!("\nAnnualized Return: {:.2}%", annualized * 100.0));
    }
    msg
}

/// `1d 2h 5m`, dropping leading zero units.
pub fn format_runtime(runtime: chrono::Duration) -> String {
    let total = runtime.num_seconds().max(0);
    let (days, hours, minutes) = (total / 86_400, total % 86_400 / 3_600, total % 3_600 / 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
