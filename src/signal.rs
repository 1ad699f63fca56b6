//! Inbound trade-signal parsing and authentication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("BUY") {
            Some(Self::Buy)
        } else if s.eq_ignore_ascii_case("SELL") {
            Some(Self::Sell)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// A validated trade signal. Immutable once parsed; the webhook token is
/// consumed by validation and never carried further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
}

impl TradeSignal {
    pub fn describe(&self) -> String {
        format!(
            "{} {} entry {} stop {}",
            self.side, self.symbol, self.entry, self.stop
        )
    }
}

/// Parse and authenticate a raw webhook body.
///
/// The token check runs before any field validation so a caller with a bad
/// token learns nothing about which fields were acceptable.
pub fn validate(raw: &str, secret: &str) -> Result<TradeSignal, PipelineError> {
    if raw.trim().is_empty() {
        return Err(PipelineError::MalformedPayload("empty body".to_string()));
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
    let payload = value
        .as_object()
        .ok_or_else(|| PipelineError::MalformedPayload("expected a JSON object".to_string()))?;

    let token = payload
        .get("token")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !constant_time_eq(token, secret) {
        return Err(PipelineError::Unauthorized);
    }

    let symbol = payload
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(PipelineError::MissingField("symbol"))?
        .to_string();

    let side = payload
        .get("side")
        .and_then(Value::as_str)
        .and_then(Side::parse)
        .ok_or(PipelineError::MissingField("side"))?;

    let entry = number_field(payload, "entry")?;
    let stop = number_field(payload, "stop")?;

    Ok(TradeSignal {
        symbol,
        side,
        entry,
        stop,
    })
}

/// Accepts JSON numbers and numeric strings; alert platforms send both.
fn number_field(
    payload: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<f64, PipelineError> {
    payload
        .get(key)
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|n| n.is_finite())
        .ok_or(PipelineError::MissingField(key))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
