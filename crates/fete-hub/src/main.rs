//! fete-hub: WebSocket broadcast hub for live event collaboration.
//!
//! Accepts WebSocket connections, groups them into rooms keyed by event id,
//! and fans presence, edits, chat, and typing out to room members. Purely
//! in-memory — domain data, auth, and HTTP endpoints live elsewhere.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use fete_hub::connection::handle_connection;
use fete_hub::Hub;

#[derive(Parser)]
#[command(name = "fete-hub", about = "Room broadcast hub for fete live collaboration")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Per-connection outbox capacity (frames buffered for a slow client).
    #[arg(long, default_value_t = 256)]
    outbox: usize,

    /// Seconds between hub statistics log lines.
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fete_hub=info".into()),
        )
        .init();

    let args = Args::parse();
    let hub = Hub::new();

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("fete-hub listening on {}", addr);

    // Periodic stats.
    let stats_hub = hub.clone();
    let every = Duration::from_secs(args.stats_interval);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            // Resolved before logging; macro arguments are not Send.
            let connections = stats_hub.connection_count().await;
            let rooms = stats_hub.room_count().await;
            tracing::debug!(connections, rooms, "hub stats");
        }
    });

    // Accept loop.
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                let outbox = args.outbox;
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, hub, outbox).await,
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
