use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use tracing::info;

use tradehook::api::{self, AppState};
use tradehook::audit::TradeLog;
use tradehook::config::Config;
use tradehook::gateway::{ib::IbGateway, GatewaySession};
use tradehook::notify::Notifier;
use tradehook::pipeline::Pipeline;
use tradehook::report::Reporter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to run the webhook listener on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tradehook=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;

    info!("Starting tradehook webhook relay");
    info!("Mode: {}", config.mode);
    info!(
        "Gateway: {}:{} (client id {})",
        config.ib_host, config.ib_port, config.ib_client_id
    );
    info!("Trading window: {}", config.trading_window().describe());
    info!(
        "Risk: {}% of {} per signal",
        config.risk_percent, config.account_size
    );

    let gateway = IbGateway::new(
        &config.ib_host,
        config.ib_port,
        config.ib_client_id,
        config.ib_connect_timeout,
    );
    let session = Arc::new(Mutex::new(GatewaySession::new(Box::new(gateway))));
    let pipeline = Arc::new(Pipeline::new(&config, session));
    let reporter = Reporter::new(
        Notifier::new(
            config.mailgun_api_key.clone(),
            config.mailgun_domain.clone(),
            config.email_sender.clone(),
            config.email_receiver.clone(),
        ),
        TradeLog::new(&config.trade_log_file),
    );

    let state = Arc::new(AppState {
        mode: config.mode,
        pipeline,
        reporter,
    });

    // Build router
    let app = Router::new()
        .route("/webhook", post(api::webhook))
        .route("/", get(api::root))
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
