//! How the live channel is actually opened.
//!
//! The lifecycle loop only sees these traits, so tests can drive it with
//! in-memory channels and the production build uses WebSockets. Split into
//! send/receive halves so the loop can await inbound frames while writing
//! outbound ones.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use fete_common::{ConnectivityError, TransportError};

/// Write half of an open live channel.
#[async_trait]
pub trait ChannelTx: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// Read half of an open live channel.
#[async_trait]
pub trait ChannelRx: Send {
    /// Next text frame; `None` once the channel is closed or broken.
    async fn recv(&mut self) -> Option<String>;
}

/// Strategy for opening the live channel.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self)
        -> Result<(Box<dyn ChannelTx>, Box<dyn ChannelRx>), ConnectivityError>;
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector: a WebSocket to the hub, bounded by a connect timeout.
pub struct WsConnector {
    url: String,
    timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
    ) -> Result<(Box<dyn ChannelTx>, Box<dyn ChannelRx>), ConnectivityError> {
        match tokio::time::timeout(self.timeout, connect_async(&self.url)).await {
            Ok(Ok((ws, _))) => {
                let (sink, stream) = ws.split();
                Ok((Box::new(WsTx { sink }), Box::new(WsRx { stream })))
            }
            Ok(Err(e)) => Err(ConnectivityError::Connect(e.to_string())),
            Err(_) => Err(ConnectivityError::Timeout(self.timeout)),
        }
    }
}

struct WsTx {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ChannelTx for WsTx {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}

struct WsRx {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl ChannelRx for WsRx {
    async fn recv(&mut self) -> Option<String> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) => return None,
                Ok(_) => {} // pings, pongs, binary — nothing to surface
                Err(e) => {
                    tracing::debug!(error = %e, "WS error");
                    return None;
                }
            }
        }
        None
    }
}
