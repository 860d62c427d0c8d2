//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_URL=wss://gateway.example.com GATEWAY_TOKEN=... cargo run -p gateway-client
//! ```
//!
//! Connects, logs every event, and closes cleanly on Ctrl-C.

use anyhow::Context;
use gateway_client::{ClientEvent, GatewayClient, GatewayOptions, WsConnector};
use gateway_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use gateway_core::CloseCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        url = %config.endpoint.url,
        compress = config.endpoint.compress,
        "Configuration loaded"
    );

    let credential = config
        .identity
        .credential()
        .context("GATEWAY_TOKEN is not set")?;
    let options = GatewayOptions::from_config(&config)?;

    let (client, mut events) = GatewayClient::spawn(options, WsConnector::new());
    client.start(credential).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    if let Err(e) = client.close(CloseCode::NORMAL).await {
        warn!(error = %e, "Close request not delivered");
    }
    client.shutdown().await;

    // Whatever the close produced
    while let Ok(event) = events.try_recv() {
        log_event(&event);
    }

    Ok(())
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::Dispatch(dispatch) => info!(
            event = %dispatch.name,
            seq = ?dispatch.sequence,
            "Dispatch received"
        ),
        ClientEvent::Ready { session_id } => info!(session_id = %session_id, "Session ready"),
        ClientEvent::Error(message) => warn!(error = %message, "Client error"),
        other => info!(event = ?other, "Client event"),
    }
}
