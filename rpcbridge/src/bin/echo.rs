//! rpcbridge-echo: answers framed calls on stdin with framed replies on stdout.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rpcbridge::peer::EchoHandler;
use rpcbridge::{Bridge, BridgeConfig, Endpoint, FramedTransmitter, ReverseBridge};

/// Initialize tracing with RPCBRIDGE_LOG and LOG_FORMAT support.
///
/// Logs go to stderr; stdout carries frames.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("RPCBRIDGE_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("rpcbridge={level},rpcbridge_echo={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = BridgeConfig::default();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        max_frame_length = config.max_frame_length,
        "Starting echo peer"
    );

    let stdout = Arc::new(FramedTransmitter::new(
        tokio::io::stdout(),
        config.max_frame_length,
    ));
    let bridge = Arc::new(Bridge::with_config(Arc::clone(&stdout), config));
    let endpoint = Endpoint::new(bridge).with_reverse(ReverseBridge::new(EchoHandler::new(stdout)));

    endpoint
        .run(tokio::io::stdin())
        .await
        .context("reading frames from stdin")?;

    tracing::info!("Echo peer finished");
    Ok(())
}
