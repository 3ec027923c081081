use std::time::Duration;

/// A client spoke the protocol wrong. Reported back to the offending transport
/// as an ERROR envelope; the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("{0} requires a prior JOIN_ROOM on this connection")]
    JoinRequired(&'static str),
}

/// A send to a live transport failed. Recovered locally by skipping that
/// recipient; never surfaced to other clients.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport send failed: {0}")]
    Send(String),
}

/// The client could not establish or keep the live channel. Retried up to the
/// configured bound, then surfaces as the degraded state.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("gave up after {attempts} connection attempts")]
    RetriesExhausted { attempts: u32 },
}
