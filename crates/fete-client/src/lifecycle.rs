//! Background connection loop: a bounded-retry state machine with a terminal
//! degraded branch and automatic room re-join after reconnect.
//!
//! One loop per client; reconnect attempts are serialized, never two in
//! flight. The retry timer is cancelled by teardown and superseded by an
//! explicit connect command.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

use fete_common::{EventId, Identity};
use fete_protocol::{
    ClientEnvelope, ClientMessage, JoinRoomPayload, LeaveRoomPayload, ServerEnvelope,
    ServerMessage,
};

use crate::presence::PresenceTracker;
use crate::transport::{ChannelRx, ChannelTx, Connector};
use crate::types::{ClientConfig, ClientEvent, Command, LinkState};

/// State shared between the handle and the connection loop.
pub(crate) struct Shared {
    pub(crate) state: RwLock<LinkState>,
    pub(crate) presence: RwLock<PresenceTracker>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(LinkState::Disconnected),
            presence: RwLock::new(PresenceTracker::new()),
        }
    }

    async fn set_state(&self, next: LinkState) {
        *self.state.write().await = next;
    }
}

enum SessionEnd {
    /// The channel dropped; the loop should retry.
    Closed,
    /// The handle asked for teardown; the loop must exit.
    Shutdown,
}

/// Outcome of waiting in degraded mode or on the retry timer.
enum Parked {
    Reconnect,
    Shutdown,
}

pub(crate) async fn connection_loop(
    config: ClientConfig,
    identity: Identity,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    event_tx: mpsc::Sender<ClientEvent>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    // Consecutive failures since the last established channel.
    let mut failures: u32 = 0;
    let mut was_degraded = false;
    // Rooms to re-join automatically after a reconnect (resume).
    let mut joined: HashSet<EventId> = HashSet::new();

    loop {
        let attempt_state = if failures == 0 {
            LinkState::Connecting
        } else {
            LinkState::Reconnecting
        };
        shared.set_state(attempt_state).await;

        match connector.connect().await {
            Ok((mut tx, mut rx)) => {
                failures = 0;
                shared.set_state(LinkState::Connected).await;
                if was_degraded {
                    was_degraded = false;
                    let _ = event_tx.send(ClientEvent::ConnectivityRestored).await;
                    tracing::info!("connectivity restored");
                }
                let _ = event_tx.send(ClientEvent::Connected).await;

                // Resume: re-join rooms from before the drop.
                for room in &joined {
                    let join = ClientMessage::JoinRoom(JoinRoomPayload {
                        room_id: room.clone(),
                        identity: identity.clone(),
                    });
                    send_message(tx.as_mut(), &join).await;
                }

                let end = session(
                    tx.as_mut(),
                    rx.as_mut(),
                    &identity,
                    &shared,
                    &event_tx,
                    &mut command_rx,
                    &mut joined,
                )
                .await;

                shared.presence.write().await.clear();
                let _ = event_tx.send(ClientEvent::Disconnected).await;

                match end {
                    SessionEnd::Shutdown => {
                        tx.close().await;
                        // Refuse further commands before the state flips, so a
                        // connect() racing the teardown fails rather than
                        // landing in a dead mailbox.
                        command_rx.close();
                        shared.set_state(LinkState::Disconnected).await;
                        return;
                    }
                    SessionEnd::Closed => {
                        shared.set_state(LinkState::Reconnecting).await;
                        tracing::warn!("live channel lost");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to open live channel");
                let _ = event_tx.send(ClientEvent::Error(e.to_string())).await;
            }
        }

        failures += 1;
        shared.set_state(LinkState::Reconnecting).await;
        if failures >= config.max_attempts {
            shared.set_state(LinkState::Degraded).await;
            tracing::warn!(attempts = failures, "retry budget spent, degrading");
            // Once per degradation: a later explicit connect that spends its
            // own budget degrades and notifies again.
            let _ = event_tx.send(ClientEvent::ConnectivityLimited).await;
            was_degraded = true;
            // Terminal until an explicit connect: no timers, no network.
            match park_degraded(&mut command_rx).await {
                Parked::Reconnect => {
                    failures = 0;
                    continue;
                }
                Parked::Shutdown => {
                    command_rx.close();
                    shared.set_state(LinkState::Disconnected).await;
                    return;
                }
            }
        }

        match wait_retry(config.retry_delay, &mut command_rx).await {
            Parked::Reconnect => {}
            Parked::Shutdown => {
                command_rx.close();
                shared.set_state(LinkState::Disconnected).await;
                return;
            }
        }
    }
}

/// One established channel, until it drops or the handle tears down.
async fn session(
    tx: &mut dyn ChannelTx,
    rx: &mut dyn ChannelRx,
    identity: &Identity,
    shared: &Shared,
    event_tx: &mpsc::Sender<ClientEvent>,
    command_rx: &mut mpsc::Receiver<Command>,
    joined: &mut HashSet<EventId>,
) -> SessionEnd {
    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(Command::JoinRoom { room, reply }) => {
                    let join = ClientMessage::JoinRoom(JoinRoomPayload {
                        room_id: room.clone(),
                        identity: identity.clone(),
                    });
                    let ok = send_message(tx, &join).await;
                    if ok {
                        joined.insert(room);
                    }
                    let _ = reply.send(ok);
                }
                Some(Command::LeaveRoom { room, reply }) => {
                    let leave = ClientMessage::LeaveRoom(LeaveRoomPayload {
                        room_id: room.clone(),
                    });
                    let ok = send_message(tx, &leave).await;
                    joined.remove(&room);
                    shared.presence.write().await.clear();
                    let _ = reply.send(ok);
                }
                Some(Command::Send { message, reply }) => {
                    let ok = send_message(tx, &message).await;
                    let _ = reply.send(ok);
                }
                Some(Command::Connect) => {} // already connected
                Some(Command::Disconnect) | None => {
                    // Best-effort goodbye for every joined room, then close.
                    for room in joined.drain() {
                        let leave = ClientMessage::LeaveRoom(LeaveRoomPayload { room_id: room });
                        send_message(tx, &leave).await;
                    }
                    return SessionEnd::Shutdown;
                }
            },

            frame = rx.recv() => match frame {
                Some(text) => handle_frame(&text, shared, event_tx).await,
                None => return SessionEnd::Closed,
            },
        }
    }
}

/// Degraded parking: answer stray calls with `false`, wake only for an
/// explicit connect or teardown.
async fn park_degraded(command_rx: &mut mpsc::Receiver<Command>) -> Parked {
    loop {
        match command_rx.recv().await {
            Some(Command::Connect) => return Parked::Reconnect,
            Some(Command::Disconnect) | None => return Parked::Shutdown,
            Some(Command::JoinRoom { reply, .. })
            | Some(Command::LeaveRoom { reply, .. })
            | Some(Command::Send { reply, .. }) => {
                let _ = reply.send(false);
            }
        }
    }
}

/// Retry timer, interruptible: teardown cancels it, an explicit connect
/// supersedes it.
async fn wait_retry(delay: Duration, command_rx: &mut mpsc::Receiver<Command>) -> Parked {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Parked::Reconnect,
            cmd = command_rx.recv() => match cmd {
                Some(Command::Connect) => return Parked::Reconnect,
                Some(Command::Disconnect) | None => return Parked::Shutdown,
                Some(Command::JoinRoom { reply, .. })
                | Some(Command::LeaveRoom { reply, .. })
                | Some(Command::Send { reply, .. }) => {
                    let _ = reply.send(false);
                }
            }
        }
    }
}

async fn send_message(tx: &mut dyn ChannelTx, message: &ClientMessage) -> bool {
    let envelope = ClientEnvelope::new(message.clone());
    match serde_json::to_string(&envelope) {
        Ok(json) => tx.send(json).await.is_ok(),
        Err(_) => false,
    }
}

/// Fold one inbound frame into presence state and the event stream.
async fn handle_frame(text: &str, shared: &Shared, event_tx: &mpsc::Sender<ClientEvent>) {
    let envelope: ServerEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(error = %e, "unrecognized frame from hub");
            return;
        }
    };

    let ServerEnvelope {
        message,
        sender,
        timestamp,
    } = envelope;

    match message {
        ServerMessage::JoinRoom(ack) if ack.success => {
            let mut presence = shared.presence.write().await;
            presence.set_active(ack.room_id.clone());
            presence.replace(&ack.room_id, ack.members.clone());
            drop(presence);
            let _ = event_tx
                .send(ClientEvent::Presence {
                    room_id: ack.room_id,
                    members: ack.members,
                })
                .await;
        }
        ServerMessage::JoinRoom(ack) => {
            let _ = event_tx
                .send(ClientEvent::Error(format!("join of {} refused", ack.room_id)))
                .await;
        }
        ServerMessage::Presence(p) => {
            shared
                .presence
                .write()
                .await
                .replace(&p.room_id, p.members.clone());
            let _ = event_tx
                .send(ClientEvent::Presence {
                    room_id: p.room_id,
                    members: p.members,
                })
                .await;
        }
        ServerMessage::Error(e) => {
            let _ = event_tx.send(ClientEvent::Error(e.message)).await;
        }
        relayed => {
            let _ = event_tx
                .send(ClientEvent::Message(ServerEnvelope {
                    message: relayed,
                    sender,
                    timestamp,
                }))
                .await;
        }
    }
}
