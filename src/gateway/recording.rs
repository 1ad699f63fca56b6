//! Recording fake gateway for tests: every call lands in a shared log.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ExecutionGateway;
use crate::bracket::{LegRole, OrderLeg};
use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Connect,
    Disconnect,
    Qualify(String),
    Place {
        role: LegRole,
        transmit: bool,
        parent: Option<i32>,
    },
}

/// Shared call log, cloneable across threads so tests can inspect
/// interleavings after concurrent pipelines finish.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<GatewayCall>>>);

impl CallLog {
    fn push(&self, call: GatewayCall) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.0.lock().unwrap().clone()
    }
}

pub struct RecordingGateway {
    log: CallLog,
    connected: bool,
    next_order_id: i32,
    placed: usize,
    /// Fail the Nth place_leg call (0-based) with a rejection.
    pub fail_place_at: Option<usize>,
    pub fail_connect: bool,
    pub unknown_symbols: Vec<String>,
    /// Hold each call open briefly so unserialized callers would
    /// interleave visibly.
    pub call_delay: Option<Duration>,
}

impl RecordingGateway {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            connected: false,
            next_order_id: 1,
            placed: 0,
            fail_place_at: None,
            fail_connect: false,
            unknown_symbols: Vec::new(),
            call_delay: None,
        }
    }

    fn pause(&self) {
        if let Some(delay) = self.call_delay {
            std::thread::sleep(delay);
        }
    }
}

impl ExecutionGateway for RecordingGateway {
    fn connect(&mut self) -> Result<(), GatewayError> {
        self.pause();
        self.log.push(GatewayCall::Connect);
        if self.fail_connect {
            return Err(GatewayError::Unavailable("connect refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.log.push(GatewayCall::Disconnect);
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn qualify(&mut self, symbol: &str) -> Result<(), GatewayError> {
        self.pause();
        self.log.push(GatewayCall::Qualify(symbol.to_string()));
        if self.unknown_symbols.iter().any(|s| s == symbol) {
            return Err(GatewayError::UnknownInstrument(symbol.to_string()));
        }
        Ok(())
    }

    fn place_leg(&mut self, leg: &OrderLeg, parent: Option<i32>) -> Result<i32, GatewayError> {
        self.pause();
        self.log.push(GatewayCall::Place {
            role: leg.role,
            transmit: leg.submit_gate,
            parent,
        });
        if self.fail_place_at == Some(self.placed) {
            return Err(GatewayError::Rejected(format!(
                "{:?} leg refused",
                leg.role
            )));
        }
        self.placed += 1;
        let id = self.next_order_id;
        self.next_order_id += 1;
        Ok(id)
    }
}
