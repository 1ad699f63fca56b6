//! Execution-gateway abstraction and the session manager that owns the
//! single live connection.

use tracing::{info, warn};

use crate::bracket::{BracketOrder, LegRole, OrderLeg};
use crate::error::GatewayError;

pub mod ib;
#[cfg(test)]
pub mod recording;

/// A connection-oriented order-execution gateway.
///
/// Implementations hold whatever broker handle they need; callers drive
/// the connect / qualify / place cycle through [`GatewaySession`].
pub trait ExecutionGateway: Send {
    fn connect(&mut self) -> Result<(), GatewayError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;

    /// Resolve a bare symbol to a tradable instrument for subsequent legs.
    fn qualify(&mut self, symbol: &str) -> Result<(), GatewayError>;

    /// Place one leg, linked to an already-placed entry when `parent` is
    /// set. Returns the gateway-side order id.
    fn place_leg(&mut self, leg: &OrderLeg, parent: Option<i32>) -> Result<i32, GatewayError>;
}

/// Owns the process-wide gateway connection. Exactly one instance exists;
/// callers serialize on the mutex wrapping it, so a trade's entire
/// connect-qualify-submit span runs without interleaving.
pub struct GatewaySession {
    gateway: Box<dyn ExecutionGateway>,
}

impl GatewaySession {
    pub fn new(gateway: Box<dyn ExecutionGateway>) -> Self {
        Self { gateway }
    }

    /// Connect, qualify, and submit one bracket.
    ///
    /// The gateway socket is externally managed and may have died since
    /// the last trade, so any existing connection is dropped and rebuilt
    /// rather than reused.
    pub fn execute(&mut self, bracket: &BracketOrder) -> Result<(), GatewayError> {
        if self.gateway.is_connected() {
            warn!("dropping previous gateway connection before trade");
            self.gateway.disconnect();
        }
        self.gateway.connect()?;
        self.gateway.qualify(&bracket.symbol)?;
        self.submit(bracket)
    }

    /// Place legs in submission order. Not transactional: a failure after
    /// the first successful placement leaves live orders behind and is
    /// surfaced as [`GatewayError::PartialSubmission`].
    fn submit(&mut self, bracket: &BracketOrder) -> Result<(), GatewayError> {
        let legs = bracket.submission_sequence();
        let total = legs.len();
        let mut entry_id = None;

        for (placed, leg) in legs.iter().enumerate() {
            let parent = match leg.role {
                LegRole::Entry => None,
                _ => entry_id,
            };
            match self.gateway.place_leg(leg, parent) {
                Ok(id) => {
                    if leg.role == LegRole::Entry {
                        entry_id = Some(id);
                    }
                }
                Err(err) if placed > 0 => {
                    return Err(GatewayError::PartialSubmission {
                        placed,
                        total,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "bracket {} submitted: {} {} x{} with {} legs",
            bracket.id, bracket.side, bracket.symbol, bracket.quantity, total
        );
        Ok(())
    }
}
