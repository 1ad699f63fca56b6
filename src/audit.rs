//! Append-only trade log.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::signal::Side;

const HEADER: [&str; 9] = [
    "Date",
    "Time",
    "Symbol",
    "Side",
    "Qty",
    "Entry",
    "StopLoss",
    "TakeProfit",
    "Reason",
];

/// One audit row; never mutated after write.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reason: String,
}

/// CSV trade log. The header is written once, when the file does not yet
/// exist; rows are only ever appended.
pub struct TradeLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn append_entry(&self, record: &TradeRecord) -> Result<()> {
        self.append_row([
            record.timestamp.format("%Y-%m-%d").to_string(),
            record.timestamp.format("%H:%M:%S").to_string(),
            record.symbol.to_uppercase(),
            record.side.to_string(),
            record.quantity.to_string(),
            format!("{:.4}", record.entry),
            format!("{:.4}", record.stop_loss),
            format!("{:.4}", record.take_profit),
            record.reason.clone(),
        ])
    }

    /// Exit fills are observed outside the webhook path; the SL/TP columns
    /// do not apply to an exit row.
    pub fn append_exit(
        &self,
        timestamp: DateTime<Utc>,
        symbol: &str,
        exit_price: f64,
        quantity: u32,
        reason: &str,
    ) -> Result<()> {
        self.append_row([
            timestamp.format("%Y-%m-%d").to_string(),
            timestamp.format("%H:%M:%S").to_string(),
            symbol.to_uppercase(),
            Side::Sell.to_string(),
            quantity.to_string(),
            format!("{exit_price:.4}"),
            "-".to_string(),
            "-".to_string(),
            reason.to_string(),
        ])
    }

    fn append_row(&self, row: [String; 9]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open trade log {:?}", self.path))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            writer.write_record(HEADER)?;
        }
        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }
}
