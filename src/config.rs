//! Environment-sourced configuration.

use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::bracket::{BracketBuilder, BracketPolicy, GateLeg};
use crate::session::TradingWindow;
use crate::sizing::RiskParameters;

/// Execution mode determines whether orders are simulated or sent to the
/// gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Simulated execution (no gateway traffic)
    Simulation,
    /// Paper trading via the TWS paper port
    Paper,
    /// Live trading
    Live,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Paper
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => write!(f, "Simulation"),
            Self::Paper => write!(f, "Paper"),
            Self::Live => write!(f, "Live"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulation" | "test" => Ok(Self::Simulation),
            "paper" => Ok(Self::Paper),
            "live" => Ok(Self::Live),
            other => Err(format!("unknown execution mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_token: String,
    pub mode: ExecutionMode,

    // Risk
    pub account_size: f64,
    pub risk_percent: f64,

    // Gateway
    pub ib_host: String,
    pub ib_port: u16,
    pub ib_client_id: i32,
    pub ib_connect_timeout: Duration,

    // Notification
    pub mailgun_api_key: String,
    pub mailgun_domain: String,
    pub email_sender: String,
    pub email_receiver: String,

    // Audit
    pub trade_log_file: String,

    // Trading window
    pub trading_tz: Tz,
    pub session_open_hour: u32,
    pub session_close_hour: u32,

    // Bracket construction
    pub bracket_policy: BracketPolicy,
    pub gate_leg: GateLeg,
    pub tick_size: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let secret_token =
            std::env::var("SECRET_TOKEN").context("SECRET_TOKEN must be set")?;
        ensure!(!secret_token.is_empty(), "SECRET_TOKEN must not be empty");

        let mode: ExecutionMode = env("EXECUTION_MODE", "paper")
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let account_size: f64 = env("ACCOUNT_SIZE", "1000")
            .parse()
            .context("ACCOUNT_SIZE must be a number")?;
        ensure!(account_size > 0.0, "ACCOUNT_SIZE must be positive");

        let risk_percent: f64 = env("RISK_PERCENT", "1.0")
            .parse()
            .context("RISK_PERCENT must be a number")?;
        ensure!(
            risk_percent > 0.0 && risk_percent <= 100.0,
            "RISK_PERCENT must be in (0, 100]"
        );

        // Paper and live TWS listen on different ports.
        let default_port = match mode {
            ExecutionMode::Live => "7496",
            _ => "7497",
        };
        let ib_port: u16 = env("IB_PORT", default_port)
            .parse()
            .context("IB_PORT must be a port number")?;
        let ib_client_id: i32 = env("IB_CLIENT_ID", "22")
            .parse()
            .context("IB_CLIENT_ID must be a number")?;
        let connect_timeout_secs: u64 = env("IB_CONNECT_TIMEOUT_SECS", "10")
            .parse()
            .context("IB_CONNECT_TIMEOUT_SECS must be a number")?;

        let trading_tz: Tz = env("TRADING_TZ", "America/New_York")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid TRADING_TZ: {e}"))?;
        let session_open_hour: u32 = env("SESSION_OPEN_HOUR", "9")
            .parse()
            .context("SESSION_OPEN_HOUR must be an hour")?;
        let session_close_hour: u32 = env("SESSION_CLOSE_HOUR", "16")
            .parse()
            .context("SESSION_CLOSE_HOUR must be an hour")?;
        ensure!(
            session_open_hour < session_close_hour && session_close_hour <= 24,
            "trading window hours must satisfy open < close <= 24"
        );

        let bracket_policy = parse_policy(
            &env("BRACKET_POLICY", "risk_multiple"),
            env("REWARD_RATIO", "2.0")
                .parse()
                .context("REWARD_RATIO must be a number")?,
            env("SL_BUFFER_PCT", "0.02")
                .parse()
                .context("SL_BUFFER_PCT must be a number")?,
            env("TP_BUFFER_PCT", "0.04")
                .parse()
                .context("TP_BUFFER_PCT must be a number")?,
        )?;
        let gate_leg = parse_gate_leg(&env("GATE_LEG", "stop_loss"))?;

        let tick_size: f64 = env("TICK_SIZE", "0.01")
            .parse()
            .context("TICK_SIZE must be a number")?;
        ensure!(tick_size > 0.0, "TICK_SIZE must be positive");

        Ok(Config {
            secret_token,
            mode,
            account_size,
            risk_percent,
            ib_host: env("IB_HOST", "127.0.0.1"),
            ib_port,
            ib_client_id,
            ib_connect_timeout: Duration::from_secs(connect_timeout_secs),
            mailgun_api_key: env("MAILGUN_API_KEY", ""),
            mailgun_domain: env("MAILGUN_DOMAIN", ""),
            email_sender: env("EMAIL_SENDER", ""),
            email_receiver: env("EMAIL_RECEIVER", ""),
            trade_log_file: env("TRADE_LOG_FILE", "executed_trades.csv"),
            trading_tz,
            session_open_hour,
            session_close_hour,
            bracket_policy,
            gate_leg,
            tick_size,
        })
    }

    pub fn risk_parameters(&self) -> RiskParameters {
        RiskParameters {
            account_size: self.account_size,
            risk_percent: self.risk_percent,
        }
    }

    pub fn trading_window(&self) -> TradingWindow {
        TradingWindow::weekdays(self.trading_tz, self.session_open_hour, self.session_close_hour)
    }

    pub fn bracket_builder(&self) -> BracketBuilder {
        BracketBuilder::new(self.bracket_policy, self.gate_leg, self.tick_size)
    }
}

fn parse_policy(
    name: &str,
    reward_ratio: f64,
    sl_pct: f64,
    tp_pct: f64,
) -> Result<BracketPolicy> {
    match name {
        "risk_multiple" => Ok(BracketPolicy::RiskMultiple { reward_ratio }),
        "percent_buffer" => Ok(BracketPolicy::PercentBuffer { sl_pct, tp_pct }),
        other => bail!("unknown BRACKET_POLICY `{other}`"),
    }
}

fn parse_gate_leg(name: &str) -> Result<GateLeg> {
    match name {
        "stop_loss" => Ok(GateLeg::StopLossLast),
        "take_profit" => Ok(GateLeg::TakeProfitLast),
        other => bail!("unknown GATE_LEG `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Paper".parse::<ExecutionMode>().unwrap(), ExecutionMode::Paper);
        assert_eq!("LIVE".parse::<ExecutionMode>().unwrap(), ExecutionMode::Live);
        assert_eq!(
            "test".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Simulation
        );
        assert!("yolo".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(
            parse_policy("risk_multiple", 2.0, 0.02, 0.04).unwrap(),
            BracketPolicy::RiskMultiple { reward_ratio: 2.0 }
        );
        assert_eq!(
            parse_policy("percent_buffer", 2.0, 0.02, 0.04).unwrap(),
            BracketPolicy::PercentBuffer {
                sl_pct: 0.02,
                tp_pct: 0.04
            }
        );
        assert!(parse_policy("martingale", 2.0, 0.02, 0.04).is_err());
    }

    #[test]
    fn gate_leg_parsing() {
        assert_eq!(parse_gate_leg("stop_loss").unwrap(), GateLeg::StopLossLast);
        assert_eq!(
            parse_gate_leg("take_profit").unwrap(),
            GateLeg::TakeProfitLast
        );
        assert!(parse_gate_leg("entry").is_err());
    }
}
