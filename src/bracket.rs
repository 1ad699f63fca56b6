//! Bracket-order construction: exit pricing and leg sequencing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signal::Side;
use crate::sizing::SizedOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegRole {
    Entry,
    TakeProfit,
    StopLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegKind {
    Limit,
    Stop,
}

/// One leg of a bracket. `submit_gate` marks the leg whose submission
/// tells the gateway to start working the whole group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub role: LegRole,
    pub action: Side,
    pub kind: LegKind,
    pub quantity: u32,
    pub price: f64,
    pub submit_gate: bool,
}

/// Which exit leg is submitted last and carries the gate.
///
/// Stop-loss-last means the group only goes live once the protective exit
/// is at the gateway; an activated bracket can never be missing its stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateLeg {
    StopLossLast,
    TakeProfitLast,
}

impl Default for GateLeg {
    fn default() -> Self {
        Self::StopLossLast
    }
}

/// Exit-pricing policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BracketPolicy {
    /// Target at `reward_ratio` times the entry-to-stop distance beyond
    /// entry; stop-loss at the signal stop.
    RiskMultiple { reward_ratio: f64 },
    /// Exits buffered a fixed percentage off entry, ignoring the signal
    /// stop.
    PercentBuffer { sl_pct: f64, tp_pct: f64 },
}

impl Default for BracketPolicy {
    fn default() -> Self {
        Self::RiskMultiple { reward_ratio: 2.0 }
    }
}

/// Entry plus both exits. Exactly one leg carries the submit gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketOrder {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub entry: OrderLeg,
    pub take_profit: OrderLeg,
    pub stop_loss: OrderLeg,
}

impl BracketOrder {
    pub fn legs(&self) -> [&OrderLeg; 3] {
        [&self.entry, &self.take_profit, &self.stop_loss]
    }

    /// Submission order: entry first, gated leg last. The gateway holds
    /// the group inactive until the gated leg arrives.
    pub fn submission_sequence(&self) -> [&OrderLeg; 3] {
        if self.stop_loss.submit_gate {
            [&self.entry, &self.take_profit, &self.stop_loss]
        } else {
            [&self.entry, &self.stop_loss, &self.take_profit]
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BracketBuilder {
    policy: BracketPolicy,
    gate_leg: GateLeg,
    /// Minimum tradable price increment; all leg prices round to it.
    tick_size: f64,
}

impl BracketBuilder {
    pub fn new(policy: BracketPolicy, gate_leg: GateLeg, tick_size: f64) -> Self {
        Self {
            policy,
            gate_leg,
            tick_size,
        }
    }

    pub fn build(&self, order: &SizedOrder) -> BracketOrder {
        let (tp_price, sl_price) = match self.policy {
            BracketPolicy::RiskMultiple { reward_ratio } => {
                let tp = match order.side {
                    Side::Buy => {
                        order.entry_price + reward_ratio * (order.entry_price - order.stop_price)
                    }
                    Side::Sell => {
                        order.entry_price - reward_ratio * (order.stop_price - order.entry_price)
                    }
                };
                (tp, order.stop_price)
            }
            BracketPolicy::PercentBuffer { sl_pct, tp_pct } => (
                order.entry_price * (1.0 + tp_pct),
                order.entry_price * (1.0 - sl_pct),
            ),
        };

        let entry = OrderLeg {
            role: LegRole::Entry,
            action: order.side,
            kind: LegKind::Limit,
            quantity: order.quantity,
            price: round_to_tick(order.entry_price, self.tick_size),
            submit_gate: false,
        };
        let take_profit = OrderLeg {
            role: LegRole::TakeProfit,
            action: order.side.opposite(),
            kind: LegKind::Limit,
            quantity: order.quantity,
            price: round_to_tick(tp_price, self.tick_size),
            submit_gate: self.gate_leg == GateLeg::TakeProfitLast,
        };
        let stop_loss = OrderLeg {
            role: LegRole::StopLoss,
            action: order.side.opposite(),
            kind: LegKind::Stop,
            quantity: order.quantity,
            price: round_to_tick(sl_price, self.tick_size),
            submit_gate: self.gate_leg == GateLeg::StopLossLast,
        };

        BracketOrder {
            id: Uuid::new_v4(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            entry,
            take_profit,
            stop_loss,
        }
    }
}

/// Round a price to the nearest multiple of the tick size.
pub fn round_to_tick(price: f64, tick: f64) -> f64 {
    let ticks = (price / tick).round();
    // Second round clears float dust from the multiply-back.
    (ticks * tick * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(side: Side, entry: f64, stop: f64) -> SizedOrder {
        SizedOrder {
            symbol: "AAPL".to_string(),
            side,
            quantity: 5,
            entry_price: entry,
            stop_price: stop,
        }
    }

    fn builder(policy: BracketPolicy, gate: GateLeg) -> BracketBuilder {
        BracketBuilder::new(policy, gate, 0.01)
    }

    #[test]
    fn risk_multiple_long() {
        let b = builder(BracketPolicy::default(), GateLeg::default());
        let bracket = b.build(&sized(Side::Buy, 100.0, 98.0));
        assert_eq!(bracket.take_profit.price, 104.0); // entry + 2 * 2.0
        assert_eq!(bracket.stop_loss.price, 98.0);
        assert_eq!(bracket.entry.price, 100.0);
    }

    #[test]
    fn risk_multiple_short() {
        let b = builder(BracketPolicy::default(), GateLeg::default());
        let bracket = b.build(&sized(Side::Sell, 100.0, 102.0));
        assert_eq!(bracket.take_profit.price, 96.0); // entry - 2 * 2.0
        assert_eq!(bracket.stop_loss.price, 102.0);
    }

    #[test]
    fn percent_buffer_rounds_to_tick() {
        let b = builder(
            BracketPolicy::PercentBuffer {
                sl_pct: 0.02,
                tp_pct: 0.04,
            },
            GateLeg::default(),
        );
        let bracket = b.build(&sized(Side::Buy, 123.456, 120.0));
        assert_eq!(bracket.stop_loss.price, 120.99); // 123.456 * 0.98 = 120.98688
        assert_eq!(bracket.take_profit.price, 128.39); // 123.456 * 1.04 = 128.39424
    }

    #[test]
    fn exits_are_on_the_opposite_side() {
        let b = builder(BracketPolicy::default(), GateLeg::default());
        let bracket = b.build(&sized(Side::Buy, 100.0, 98.0));
        assert_eq!(bracket.entry.action, Side::Buy);
        assert_eq!(bracket.take_profit.action, Side::Sell);
        assert_eq!(bracket.stop_loss.action, Side::Sell);
        assert_eq!(bracket.take_profit.kind, LegKind::Limit);
        assert_eq!(bracket.stop_loss.kind, LegKind::Stop);
    }

    #[test]
    fn exactly_one_leg_carries_the_gate() {
        for gate in [GateLeg::StopLossLast, GateLeg::TakeProfitLast] {
            let b = builder(BracketPolicy::default(), gate);
            let bracket = b.build(&sized(Side::Buy, 100.0, 98.0));
            let gated = bracket.legs().iter().filter(|l| l.submit_gate).count();
            assert_eq!(gated, 1);
            assert!(!bracket.entry.submit_gate);
        }
    }

    #[test]
    fn gated_leg_is_submitted_last() {
        let b = builder(BracketPolicy::default(), GateLeg::StopLossLast);
        let bracket = b.build(&sized(Side::Buy, 100.0, 98.0));
        let seq = bracket.submission_sequence();
        assert_eq!(seq[0].role, LegRole::Entry);
        assert_eq!(seq[2].role, LegRole::StopLoss);
        assert!(seq[2].submit_gate);

        let b = builder(BracketPolicy::default(), GateLeg::TakeProfitLast);
        let bracket = b.build(&sized(Side::Buy, 100.0, 98.0));
        let seq = bracket.submission_sequence();
        assert_eq!(seq[0].role, LegRole::Entry);
        assert_eq!(seq[2].role, LegRole::TakeProfit);
        assert!(seq[2].submit_gate);
    }

    #[test]
    fn tick_rounding() {
        assert_eq!(round_to_tick(104.0000000001, 0.01), 104.0);
        assert_eq!(round_to_tick(120.98688, 0.01), 120.99);
        assert_eq!(round_to_tick(21500.37, 0.25), 21500.25);
    }
}
