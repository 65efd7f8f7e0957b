//! Copy-Trading Stream Binary
//!
//! Connects to the private feed and logs every copy-trading message.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin copytrade-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required (private channel)
//! - `BYBIT_API_KEY`: API key
//! - `BYBIT_API_SECRET`: API secret
//!
//! ## Optional
//! - `COPYTRADE_CHANNEL_TYPE`: channel type (default: private)
//! - `COPYTRADE_NETWORK`: mainnet | testnet | demo (default: mainnet)
//! - `COPYTRADE_DOMAIN`: venue domain (default: bybit)
//! - `COPYTRADE_ENDPOINT`: full endpoint URL override
//! - `COPYTRADE_STREAM_*`: connection tuning, see `StreamConfig`
//! - `COPYTRADE_STREAM_METRICS_PORT`: Prometheus metrics port (default: 9090, 0 disables)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: Log filter (default: `copytrade_stream=info`)

use copytrade_stream::infrastructure::venue::{
    TOPIC_EXECUTION, TOPIC_ORDER, TOPIC_POSITION, TOPIC_WALLET,
};
use copytrade_stream::{
    CopyTradingStream, StreamConfig, StreamMessage, StreamOptions, init_metrics, init_telemetry,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = init_telemetry()?;

    tracing::info!("Starting copy-trading stream");

    let config = StreamConfig::from_env()?;
    log_config(&config);

    if let Some(addr) = init_metrics(config.metrics_port)? {
        tracing::info!(%addr, "Metrics exporter listening");
    }

    let stream = CopyTradingStream::new(&config.channel_type, StreamOptions::from(&config))?;

    stream.copy_trade_position_stream(log_message)?;
    stream.copy_trade_order_stream(log_message)?;
    stream.copy_trade_execution_stream(log_message)?;
    stream.copy_trade_wallet_stream(log_message)?;

    tracing::info!(
        endpoint = %stream.endpoint(),
        topics = ?[TOPIC_POSITION, TOPIC_ORDER, TOPIC_EXECUTION, TOPIC_WALLET],
        "Subscribed to copy-trading streams"
    );

    let mut state_changes = stream.manager().state_changes();
    tokio::select! {
        () = await_shutdown() => {}
        _ = state_changes.wait_for(|state| state.is_closed()) => {
            tracing::warn!("Stream closed, exiting");
        }
    }

    stream.close();
    tracing::info!("Shutdown complete");
    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn log_message(message: &StreamMessage) -> anyhow::Result<()> {
    tracing::info!(
        topic = %message.topic,
        id = message.id.as_deref().unwrap_or_default(),
        created_at = ?message.created_at(),
        data = %message.data,
        "Copy-trading update"
    );
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        channel_type = %config.channel_type,
        network = config.network.as_str(),
        domain = %config.domain,
        endpoint_override = config.endpoint_override.as_deref().unwrap_or("none"),
        has_credentials = config.api_key.is_some() && config.api_secret.is_some(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(settings = ?config.connection, "Connection settings");
}

fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
