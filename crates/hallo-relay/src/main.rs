//! hallo-relay: WebSocket matchmaking server.
//!
//! Accepts WebSocket connections, queues authenticated participants, and
//! pairs them into two-party sessions once both sides accept a proposed
//! candidate within the deadline. In-session signaling payloads are
//! relayed opaquely — the server never inspects them.

mod connection;

use std::time::Duration;

use clap::Parser;
use hallo_engine::{Engine, EngineConfig, Matchmaker};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use crate::connection::handle_connection;

#[derive(Parser)]
#[command(name = "hallo-relay", about = "Anonymous two-party matchmaking relay")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 4321)]
    port: u16,

    /// Seconds both sides get to accept a proposed pairing.
    #[arg(long, default_value_t = 10)]
    accept_timeout: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hallo_relay=info,hallo_engine=info".into()),
        )
        .init();

    let args = Args::parse();
    let engine = Engine::new(EngineConfig {
        accept_timeout: Duration::from_secs(args.accept_timeout),
    });

    // The single drain coordinator; all pairing decisions happen here.
    Matchmaker::new(engine.clone()).spawn();

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("hallo-relay listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let engine = engine.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, engine).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
