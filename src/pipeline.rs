//! The signal pipeline: validate, gate, size, build, submit.
//!
//! Runs synchronously end-to-end; callers put it on a blocking thread.
//! All failure modes collapse into a terminal [`Outcome`] so the webhook
//! layer never sees a panic or an unclassified error.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::audit::TradeRecord;
use crate::bracket::BracketBuilder;
use crate::config::{Config, ExecutionMode};
use crate::error::PipelineError;
use crate::gateway::GatewaySession;
use crate::session::TradingWindow;
use crate::signal::{validate, TradeSignal};
use crate::sizing::{size_order, RiskParameters};

/// Terminal result of one webhook delivery.
#[derive(Debug)]
pub enum Outcome {
    /// The bracket is live at the gateway.
    Executed { record: TradeRecord },
    /// Simulation mode: the order was built but nothing was sent.
    Test { signal: TradeSignal, quantity: u32 },
    /// Signal arrived outside the trading window.
    Blocked { signal: TradeSignal, reason: String },
    /// Token mismatch.
    Unauthorized,
    /// Validation, sizing, or gateway failure.
    Error { error: PipelineError },
}

pub struct Pipeline {
    secret: String,
    mode: ExecutionMode,
    window: TradingWindow,
    risk: RiskParameters,
    builder: BracketBuilder,
    session: Arc<Mutex<GatewaySession>>,
}

impl Pipeline {
    pub fn new(config: &Config, session: Arc<Mutex<GatewaySession>>) -> Self {
        Self {
            secret: config.secret_token.clone(),
            mode: config.mode,
            window: config.trading_window(),
            risk: config.risk_parameters(),
            builder: config.bracket_builder(),
            session,
        }
    }

    /// Run one signal end-to-end. `now` is passed in so the session gate
    /// stays testable against fixed timestamps.
    pub fn handle(&self, raw: &str, now: DateTime<Utc>) -> Outcome {
        let signal = match validate(raw, &self.secret) {
            Ok(signal) => signal,
            Err(PipelineError::Unauthorized) => {
                warn!("rejected webhook: token mismatch");
                return Outcome::Unauthorized;
            }
            Err(error) => {
                warn!("rejected webhook: {error}");
                return Outcome::Error { error };
            }
        };

        if !self.window.is_open(now) {
            let error = PipelineError::SessionBlocked(self.window.describe());
            warn!("{} for {}", error, signal.describe());
            return Outcome::Blocked {
                reason: error.to_string(),
                signal,
            };
        }

        let sized = match size_order(&signal, &self.risk) {
            Ok(sized) => sized,
            Err(error) => {
                warn!("sizing failed for {}: {error}", signal.describe());
                return Outcome::Error { error };
            }
        };

        let bracket = self.builder.build(&sized);
        info!(
            "sized {}: qty {} entry {} tp {} sl {}",
            signal.describe(),
            bracket.quantity,
            bracket.entry.price,
            bracket.take_profit.price,
            bracket.stop_loss.price
        );

        if self.mode == ExecutionMode::Simulation {
            info!("simulation mode - no order placed");
            return Outcome::Test {
                quantity: bracket.quantity,
                signal,
            };
        }

        // The whole connect-qualify-submit span runs under one lock so
        // concurrent deliveries cannot interleave gateway sessions.
        let result = {
            let mut session = self
                .session
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            session.execute(&bracket)
        };

        match result {
            Ok(()) => Outcome::Executed {
                record: TradeRecord {
                    timestamp: now,
                    symbol: bracket.symbol.clone(),
                    side: bracket.side,
                    quantity: bracket.quantity,
                    entry: bracket.entry.price,
                    stop_loss: bracket.stop_loss.price,
                    take_profit: bracket.take_profit.price,
                    reason: "entry".to_string(),
                },
            },
            Err(error) => Outcome::Error {
                error: PipelineError::Gateway(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{BracketPolicy, GateLeg};
    use crate::error::GatewayError;
    use crate::gateway::recording::{CallLog, GatewayCall, RecordingGateway};
    use crate::signal::Side;
    use chrono::TimeZone;
    use std::time::Duration;

    const SECRET: &str = "T";

    fn test_config(mode: ExecutionMode) -> Config {
        Config {
            secret_token: SECRET.to_string(),
            mode,
            account_size: 1000.0,
            risk_percent: 1.0,
            ib_host: "127.0.0.1".to_string(),
            ib_port: 7497,
            ib_client_id: 22,
            ib_connect_timeout: Duration::from_secs(1),
            mailgun_api_key: String::new(),
            mailgun_domain: String::new(),
            email_sender: String::new(),
            email_receiver: String::new(),
            trade_log_file: "executed_trades.csv".to_string(),
            trading_tz: chrono_tz::America::New_York,
            session_open_hour: 9,
            session_close_hour: 16,
            bracket_policy: BracketPolicy::default(),
            gate_leg: GateLeg::default(),
            tick_size: 0.01,
        }
    }

    fn pipeline_with(
        mode: ExecutionMode,
        configure: impl FnOnce(&mut RecordingGateway),
    ) -> (Pipeline, CallLog) {
        let log = CallLog::default();
        let mut gateway = RecordingGateway::new(log.clone());
        configure(&mut gateway);
        let session = Arc::new(Mutex::new(GatewaySession::new(Box::new(gateway))));
        (Pipeline::new(&test_config(mode), session), log)
    }

    // Tue 2024-01-16 12:00 ET, inside the default window.
    fn open_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 16, 17, 0, 0).unwrap()
    }

    fn payload() -> String {
        format!(r#"{{"token":"{SECRET}","symbol":"AAPL","side":"BUY","entry":100,"stop":98}}"#)
    }

    #[test]
    fn end_to_end_example() {
        let (pipeline, log) = pipeline_with(ExecutionMode::Paper, |_| {});

        let outcome = pipeline.handle(&payload(), open_time());
        let record = match outcome {
            Outcome::Executed { record } => record,
            other => panic!("expected executed, got {other:?}"),
        };

        // 1% of 1000 over a 2-point stop: 5 units; 2:1 target at 104.
        assert_eq!(record.quantity, 5);
        assert_eq!(record.side, Side::Buy);
        assert_eq!(record.entry, 100.0);
        assert_eq!(record.take_profit, 104.0);
        assert_eq!(record.stop_loss, 98.0);

        let calls = log.calls();
        assert_eq!(calls[0], GatewayCall::Connect);
        assert_eq!(calls[1], GatewayCall::Qualify("AAPL".to_string()));
        assert_eq!(calls.len(), 5);
    }

    #[test]
    fn entry_equal_to_stop_never_touches_the_gateway() {
        let (pipeline, log) = pipeline_with(ExecutionMode::Paper, |_| {});

        let body =
            format!(r#"{{"token":"{SECRET}","symbol":"AAPL","side":"BUY","entry":100,"stop":100}}"#);
        let outcome = pipeline.handle(&body, open_time());

        assert!(matches!(
            outcome,
            Outcome::Error {
                error: PipelineError::InvalidRisk
            }
        ));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn token_mismatch_is_unauthorized() {
        let (pipeline, log) = pipeline_with(ExecutionMode::Paper, |_| {});

        let body = r#"{"token":"wrong","symbol":"AAPL","side":"BUY","entry":100,"stop":98}"#;
        assert!(matches!(
            pipeline.handle(body, open_time()),
            Outcome::Unauthorized
        ));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn weekend_signal_is_blocked() {
        let (pipeline, log) = pipeline_with(ExecutionMode::Paper, |_| {});

        // Sat 2024-01-13 12:00 ET
        let saturday = Utc.with_ymd_and_hms(2024, 1, 13, 17, 0, 0).unwrap();
        let outcome = pipeline.handle(&payload(), saturday);

        match outcome {
            Outcome::Blocked { signal, .. } => assert_eq!(signal.symbol, "AAPL"),
            other => panic!("expected blocked, got {other:?}"),
        }
        assert!(log.calls().is_empty());
    }

    #[test]
    fn simulation_mode_builds_but_does_not_submit() {
        let (pipeline, log) = pipeline_with(ExecutionMode::Simulation, |_| {});

        let outcome = pipeline.handle(&payload(), open_time());
        match outcome {
            Outcome::Test { quantity, .. } => assert_eq!(quantity, 5),
            other => panic!("expected test outcome, got {other:?}"),
        }
        assert!(log.calls().is_empty());
    }

    #[test]
    fn leg_failure_mid_bracket_surfaces_as_partial_submission() {
        let (pipeline, _log) = pipeline_with(ExecutionMode::Paper, |g| {
            g.fail_place_at = Some(2);
        });

        let outcome = pipeline.handle(&payload(), open_time());
        match outcome {
            Outcome::Error {
                error: PipelineError::Gateway(GatewayError::PartialSubmission { placed, total, .. }),
            } => {
                assert_eq!(placed, 2);
                assert_eq!(total, 3);
            }
            other => panic!("expected partial submission, got {other:?}"),
        }
    }

    #[test]
    fn gateway_connect_failure_is_an_error_outcome() {
        let (pipeline, _log) = pipeline_with(ExecutionMode::Paper, |g| {
            g.fail_connect = true;
        });

        assert!(matches!(
            pipeline.handle(&payload(), open_time()),
            Outcome::Error {
                error: PipelineError::Gateway(GatewayError::Unavailable(_))
            }
        ));
    }

    #[test]
    fn concurrent_signals_serialize_on_the_gateway_session() {
        let (pipeline, log) = pipeline_with(ExecutionMode::Paper, |g| {
            g.call_delay = Some(Duration::from_millis(5));
        });
        let pipeline = Arc::new(pipeline);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || pipeline.handle(&payload(), open_time()))
            })
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.join().unwrap(),
                Outcome::Executed { .. }
            ));
        }

        // Each delivery's gateway span must be contiguous: every connect
        // is followed by its own qualify and all three legs before the
        // other request touches the session.
        let calls = log.calls();
        let connects: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == GatewayCall::Connect)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(connects.len(), 2);
        for &start in &connects {
            assert!(matches!(calls[start + 1], GatewayCall::Qualify(_)));
            for offset in 2..5 {
                assert!(matches!(calls[start + offset], GatewayCall::Place { .. }));
            }
        }
    }
}
