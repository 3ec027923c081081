//! Per-socket task: pump the outbox, parse inbound frames, dispatch to the hub.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use fete_common::{Identity, ProtocolError};
use fete_protocol::{ClientEnvelope, ClientMessage, ErrorPayload, ServerEnvelope, ServerMessage};

use crate::broadcast;
use crate::registry::{Outbound, RoomTx};
use crate::router::Hub;

/// Handle a single WebSocket connection for its whole lifetime.
///
/// The outbox channel is this connection's transport handle: the hub's
/// broadcaster pushes frames into it, this task writes them to the socket.
pub async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    addr: SocketAddr,
    hub: Hub,
    outbox_capacity: usize,
) {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(outbox_capacity);

    // Set by the first successful JOIN_ROOM; the join-before-use gate.
    let mut identity: Option<Identity> = None;

    loop {
        tokio::select! {
            // Frames queued by the broadcaster → this client's socket.
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(msg)) => {
                    if sink.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                // The identity re-registered on a newer transport; this
                // socket task is obsolete.
                Some(Outbound::Retire) | None => {
                    tracing::debug!(peer = %addr, "transport retired");
                    break;
                }
            },

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEnvelope>(&text) {
                            Ok(envelope) => {
                                dispatch(&hub, &tx, &mut identity, envelope.message).await;
                            }
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "unparseable frame");
                                send_error(&tx, &ProtocolError::Malformed(e.to_string()));
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Exactly one close per task. The hub only cleans up if this transport
    // still owns the identity, so a late close after a reconnect (or a
    // retirement) cannot tear down the fresh connection.
    if let Some(identity) = identity {
        tracing::info!(peer = %addr, identity = %identity.id, "client disconnected");
        hub.disconnect(&identity.id, &tx).await;
    }
}

/// Route one inbound message. Anything but JOIN_ROOM before the first join is
/// answered with an ERROR on this transport only and otherwise dropped.
async fn dispatch(hub: &Hub, tx: &RoomTx, identity: &mut Option<Identity>, message: ClientMessage) {
    match message {
        ClientMessage::JoinRoom(payload) => {
            hub.join(payload.identity.clone(), payload.room_id, tx.clone())
                .await;
            *identity = Some(payload.identity);
        }
        other => {
            let Some(who) = identity.as_ref() else {
                send_error(tx, &ProtocolError::JoinRequired(other.kind()));
                return;
            };
            match other {
                ClientMessage::LeaveRoom(payload) => hub.leave(&who.id, payload.room_id).await,
                relayed => hub.relay(&who.id, relayed).await,
            }
        }
    }
}

fn send_error(tx: &RoomTx, error: &ProtocolError) {
    let envelope = ServerEnvelope::new(ServerMessage::Error(ErrorPayload {
        message: error.to_string(),
    }));
    broadcast::unicast(tx, &envelope);
}
