//! Interactive Brokers gateway over TWS / IB Gateway.

use std::sync::mpsc;
use std::time::Duration;

use ibapi::contracts::{Contract, SecurityType};
use ibapi::orders::{order_builder, Action};
use ibapi::Client;
use tracing::{debug, info};

use super::ExecutionGateway;
use crate::bracket::{LegKind, OrderLeg};
use crate::error::GatewayError;
use crate::signal::Side;

/// IB connection settings (paper port 7497, live 7496).
pub struct IbGateway {
    host: String,
    port: u16,
    client_id: i32,
    connect_timeout: Duration,
    client: Option<Client>,
    qualified: Option<Contract>,
    next_order_id: i32,
}

impl IbGateway {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        client_id: i32,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            client_id,
            connect_timeout,
            client: None,
            qualified: None,
            next_order_id: 1,
        }
    }

    fn get_next_order_id(&mut self) -> i32 {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    fn stock_contract(symbol: &str) -> Contract {
        Contract {
            symbol: symbol.to_string(),
            security_type: SecurityType::Stock,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }
}

impl ExecutionGateway for IbGateway {
    fn connect(&mut self) -> Result<(), GatewayError> {
        if self.client.is_some() {
            self.disconnect();
        }

        let url = format!("{}:{}", self.host, self.port);
        info!("Connecting to IB at {} (client id {})...", url, self.client_id);

        // Client::connect blocks with no deadline of its own; run it on a
        // helper thread so the bound holds. A connection that lands after
        // the deadline is dropped along with the channel.
        let client_id = self.client_id;
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(Client::connect(&url, client_id));
        });

        match rx.recv_timeout(self.connect_timeout) {
            Ok(Ok(client)) => {
                self.client = Some(client);
                info!("Connected to IB");
                Ok(())
            }
            Ok(Err(e)) => Err(GatewayError::Unavailable(format!("connect failed: {e}"))),
            Err(_) => Err(GatewayError::Unavailable(format!(
                "connect timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    fn disconnect(&mut self) {
        // Dropping the client closes the socket.
        self.client = None;
        self.qualified = None;
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn qualify(&mut self, symbol: &str) -> Result<(), GatewayError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| GatewayError::Unavailable("not connected".to_string()))?;

        let contract = Self::stock_contract(symbol);
        let mut details = client
            .contract_details(&contract)
            .map_err(|e| GatewayError::Unavailable(format!("contract lookup failed: {e}")))?;

        match details.len() {
            0 => Err(GatewayError::UnknownInstrument(symbol.to_string())),
            1 => {
                let detail = details.remove(0);
                debug!(
                    "Qualified {} on {}",
                    detail.contract.symbol, detail.contract.exchange
                );
                self.qualified = Some(detail.contract);
                Ok(())
            }
            n => Err(GatewayError::UnknownInstrument(format!(
                "{symbol} is ambiguous ({n} matches)"
            ))),
        }
    }

    fn place_leg(&mut self, leg: &OrderLeg, parent: Option<i32>) -> Result<i32, GatewayError> {
        let order_id = self.get_next_order_id();

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| GatewayError::Unavailable("not connected".to_string()))?;
        let contract = self
            .qualified
            .as_ref()
            .ok_or_else(|| GatewayError::Unavailable("no qualified instrument".to_string()))?;

        let action = match leg.action {
            Side::Buy => Action::Buy,
            Side::Sell => Action::Sell,
        };

        let mut order = match leg.kind {
            LegKind::Limit => order_builder::limit_order(action, leg.quantity as f64, leg.price),
            LegKind::Stop => order_builder::stop(action, leg.quantity as f64, leg.price),
        };
        order.order_id = order_id;
        if let Some(parent_id) = parent {
            order.parent_id = parent_id;
        }
        order.transmit = leg.submit_gate;

        debug!(
            "Placing {:?}: {} {} @ {:.2} transmit={}",
            leg.role, leg.action, leg.quantity, leg.price, order.transmit
        );

        client
            .place_order(order_id, contract, &order)
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;

        Ok(order_id)
    }
}
