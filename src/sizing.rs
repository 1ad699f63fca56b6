//! Risk-based position sizing.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::signal::{Side, TradeSignal};

/// Account-level risk configuration, loaded once at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskParameters {
    pub account_size: f64,
    /// Percent of the account risked per trade, in (0, 100].
    pub risk_percent: f64,
}

impl RiskParameters {
    pub fn risk_amount(&self) -> f64 {
        self.account_size * self.risk_percent / 100.0
    }
}

/// A signal with its computed quantity. Exit prices are the bracket
/// builder's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: f64,
    pub stop_price: f64,
}

/// Size a signal from the distance to its stop.
///
/// Quantity floors at 1: a signal too small for its risk budget still
/// places a single unit rather than being rejected.
pub fn size_order(signal: &TradeSignal, risk: &RiskParameters) -> Result<SizedOrder, PipelineError> {
    let risk_per_unit = (signal.entry - signal.stop).abs();
    if risk_per_unit == 0.0 {
        return Err(PipelineError::InvalidRisk);
    }

    let quantity = ((risk.risk_amount() / risk_per_unit).floor() as u32).max(1);

    Ok(SizedOrder {
        symbol: signal.symbol.clone(),
        side: signal.side,
        quantity,
        entry_price: signal.entry,
        stop_price: signal.stop,
    })
}
