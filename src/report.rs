//! Outcome reporting: audit rows and operator notifications.

use std::sync::Arc;

use tracing::{error, info};

use crate::audit::TradeLog;
use crate::error::PipelineError;
use crate::notify::Notifier;
use crate::pipeline::Outcome;

pub struct Reporter {
    notifier: Arc<Notifier>,
    trade_log: Arc<TradeLog>,
}

impl Reporter {
    pub fn new(notifier: Notifier, trade_log: TradeLog) -> Self {
        Self {
            notifier: Arc::new(notifier),
            trade_log: Arc::new(trade_log),
        }
    }

    /// Record and announce one terminal outcome. Audit or notification
    /// failures are logged and never change the outcome already decided.
    pub fn report(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Executed { record } => {
                if let Err(e) = self.trade_log.append_entry(record) {
                    error!("failed to append trade record: {e:#}");
                }
                self.notify(
                    "Trade Executed",
                    format!(
                        "{} {} {} @ {}",
                        record.side, record.quantity, record.symbol, record.entry
                    ),
                );
            }
            Outcome::Test { signal, quantity } => {
                info!(
                    "simulation mode - would execute {} {} {} @ {}",
                    signal.side, quantity, signal.symbol, signal.entry
                );
            }
            Outcome::Blocked { signal, reason } => {
                self.notify("Signal Blocked", format!("{} ({reason})", signal.describe()));
            }
            Outcome::Unauthorized => {
                self.notify(
                    "Unauthorized Webhook",
                    "a trade signal was rejected: token mismatch".to_string(),
                );
            }
            Outcome::Error { error } => {
                let urgent =
                    matches!(error, PipelineError::Gateway(g) if g.is_partial());
                let subject = if urgent {
                    // Legs are live without their siblings; someone has to
                    // reconcile the gateway state by hand.
                    "URGENT: Partial Bracket Submission"
                } else {
                    "Bot Error"
                };
                self.notify(subject, error.to_string());
            }
        }
    }

    /// Fire-and-forget: delivery must never delay the webhook response.
    fn notify(&self, subject: &str, body: String) {
        let notifier = self.notifier.clone();
        let subject = subject.to_string();
        tokio::spawn(async move {
            notifier.send(&subject, &body).await;
        });
    }
}
