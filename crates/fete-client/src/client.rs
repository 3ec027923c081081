//! The [`LiveClient`] handle: what view code holds.
//!
//! All network work happens in a background task ([`crate::lifecycle`]); the
//! handle sends it commands and reads shared state. Every method keeps the
//! same shape in every lifecycle state — degraded calls return `false` and
//! touch local state only, they never panic or block on the network.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use fete_common::{EventId, Identity};
use fete_protocol::ClientMessage;

use crate::lifecycle::{connection_loop, Shared};
use crate::transport::{Connector, WsConnector};
use crate::types::{ClientConfig, ClientEvent, Command, LinkState};

const EVENT_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 32;

/// Everything the background task needs, held until the first `connect()`.
struct Seed {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    event_tx: mpsc::Sender<ClientEvent>,
    command_rx: mpsc::Receiver<Command>,
}

/// Handle to a live-channel session.
pub struct LiveClient {
    identity: Identity,
    command_tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    seed: Mutex<Option<Seed>>,
}

impl LiveClient {
    /// Build a client over any [`Connector`]. Nothing touches the network
    /// until [`connect`](Self::connect).
    pub fn new(
        identity: Identity,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let client = Self {
            identity,
            command_tx,
            shared: Arc::new(Shared::new()),
            seed: Mutex::new(Some(Seed {
                config,
                connector,
                event_tx,
                command_rx,
            })),
        };
        (client, event_rx)
    }

    /// Build a client that talks WebSocket to `config.url`.
    pub fn with_websocket(
        identity: Identity,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let connector = Arc::new(WsConnector::new(config.url.clone(), config.connect_timeout));
        Self::new(identity, config, connector)
    }

    /// Start the session, or restart it after degrading. The first call
    /// spawns the background task; later calls wake it with a fresh retry
    /// budget.
    ///
    /// Returns `false` once the session has been torn down by
    /// [`disconnect`](Self::disconnect): a handle is single-session, build a
    /// new client to go live again.
    pub async fn connect(&self) -> bool {
        let seed = self.seed.lock().ok().and_then(|mut slot| slot.take());
        match seed {
            Some(seed) => {
                tokio::spawn(connection_loop(
                    seed.config,
                    self.identity.clone(),
                    seed.connector,
                    Arc::clone(&self.shared),
                    seed.event_tx,
                    seed.command_rx,
                ));
                true
            }
            None => self.command_tx.send(Command::Connect).await.is_ok(),
        }
    }

    /// Tear the session down. Joined rooms get a LEAVE_ROOM before the
    /// channel closes.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(Command::Disconnect).await;
    }

    /// Join a room. Returns whether the request reached the wire; the
    /// membership list arrives later as a [`ClientEvent::Presence`].
    ///
    /// Degraded: records the room locally with the caller as its only
    /// member, and returns `false`.
    pub async fn join_room(&self, room: EventId) -> bool {
        match self.state().await {
            LinkState::Connected => {
                let (reply, reply_rx) = oneshot::channel();
                if self
                    .command_tx
                    .send(Command::JoinRoom { room, reply })
                    .await
                    .is_err()
                {
                    return false;
                }
                reply_rx.await.unwrap_or(false)
            }
            LinkState::Degraded => {
                self.shared
                    .presence
                    .write()
                    .await
                    .set_local_only(room, self.identity.clone());
                false
            }
            _ => false,
        }
    }

    /// Leave a room. Degraded: clears local presence and returns `false`.
    pub async fn leave_room(&self, room: EventId) -> bool {
        match self.state().await {
            LinkState::Connected => {
                let (reply, reply_rx) = oneshot::channel();
                if self
                    .command_tx
                    .send(Command::LeaveRoom { room, reply })
                    .await
                    .is_err()
                {
                    return false;
                }
                reply_rx.await.unwrap_or(false)
            }
            LinkState::Degraded => {
                self.shared.presence.write().await.clear();
                false
            }
            _ => false,
        }
    }

    /// Send a domain message (edit, chat, typing) to its room.
    pub async fn send(&self, message: ClientMessage) -> bool {
        if self.state().await != LinkState::Connected {
            return false;
        }
        let (reply, reply_rx) = oneshot::channel();
        if self
            .command_tx
            .send(Command::Send { message, reply })
            .await
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    pub async fn state(&self) -> LinkState {
        *self.shared.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == LinkState::Connected
    }

    pub async fn is_degraded(&self) -> bool {
        self.state().await == LinkState::Degraded
    }

    /// Last-known membership of the active room.
    pub async fn active_participants(&self) -> Vec<Identity> {
        self.shared.presence.read().await.members().to_vec()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex as AsyncMutex;

    use fete_common::{ConnectivityError, TransportError};
    use fete_protocol::{
        ClientEnvelope, JoinAckPayload, RelayPayload, ServerEnvelope, ServerMessage,
    };

    use crate::transport::{ChannelRx, ChannelTx};

    use super::*;

    // In-memory transport: each scripted accept hands the test a peer with
    // the other ends of the channel pair.

    struct TestTx(mpsc::Sender<String>);

    #[async_trait]
    impl ChannelTx for TestTx {
        async fn send(&mut self, text: String) -> Result<(), TransportError> {
            self.0
                .send(text)
                .await
                .map_err(|_| TransportError::Closed)
        }

        async fn close(&mut self) {}
    }

    struct TestRx(mpsc::Receiver<String>);

    #[async_trait]
    impl ChannelRx for TestRx {
        async fn recv(&mut self) -> Option<String> {
            self.0.recv().await
        }
    }

    /// The hub side of one accepted channel.
    struct TestPeer {
        tx: mpsc::Sender<String>,
        rx: mpsc::Receiver<String>,
    }

    impl TestPeer {
        async fn recv_message(&mut self) -> ClientMessage {
            let text = self.rx.recv().await.expect("client hung up");
            let envelope: ClientEnvelope = serde_json::from_str(&text).expect("bad frame");
            envelope.message
        }

        async fn send_envelope(&mut self, envelope: ServerEnvelope) {
            let json = serde_json::to_string(&envelope).expect("serialize");
            self.tx.send(json).await.expect("client hung up");
        }

        /// Drop the hub side, simulating a network cut.
        fn hang_up(self) {}
    }

    fn pair() -> ((Box<dyn ChannelTx>, Box<dyn ChannelRx>), TestPeer) {
        let (client_tx, peer_rx) = mpsc::channel(16);
        let (peer_tx, client_rx) = mpsc::channel(16);
        (
            (Box::new(TestTx(client_tx)), Box::new(TestRx(client_rx))),
            TestPeer {
                tx: peer_tx,
                rx: peer_rx,
            },
        )
    }

    /// Connector driven by a script: `Some` accepts with the queued halves,
    /// `None` (and an exhausted script) refuses.
    struct ScriptedConnector {
        outcomes: AsyncMutex<VecDeque<Option<(Box<dyn ChannelTx>, Box<dyn ChannelRx>)>>>,
        attempts: AtomicU32,
    }

    impl ScriptedConnector {
        fn new(
            outcomes: Vec<Option<(Box<dyn ChannelTx>, Box<dyn ChannelRx>)>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                outcomes: AsyncMutex::new(outcomes.into()),
                attempts: AtomicU32::new(0),
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(
            &self,
        ) -> Result<(Box<dyn ChannelTx>, Box<dyn ChannelRx>), ConnectivityError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.lock().await.pop_front() {
                Some(Some(halves)) => Ok(halves),
                _ => Err(ConnectivityError::Connect("connection refused".into())),
            }
        }
    }

    fn me() -> Identity {
        Identity::new("u1", "Ada")
    }

    fn config() -> ClientConfig {
        ClientConfig {
            url: "ws://test".into(),
            max_attempts: 5,
            retry_delay: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(1),
        }
    }

    async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event")
            .expect("event stream closed")
    }

    async fn wait_for(client: &LiveClient, state: LinkState) {
        for _ in 0..200 {
            if client.state().await == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("never reached {:?}", state);
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_after_bounded_retries() {
        let connector = ScriptedConnector::new(vec![]);
        let (client, mut events) = LiveClient::new(me(), config(), connector.clone());
        client.connect().await;

        // Five refusals, each reported, then one degradation notice.
        let mut limited = 0;
        loop {
            match next_event(&mut events).await {
                ClientEvent::ConnectivityLimited => {
                    limited += 1;
                    break;
                }
                ClientEvent::Error(_) => {}
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(limited, 1);
        assert_eq!(connector.attempts(), 5);
        assert!(client.is_degraded().await);

        // Degraded calls keep their shape, report false, spend no attempts.
        assert!(!client.join_room(EventId::new("42")).await);
        assert_eq!(connector.attempts(), 5);
        assert_eq!(client.active_participants().await, vec![me()]);

        assert!(!client.leave_room(EventId::new("42")).await);
        assert!(client.active_participants().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_connect_recovers_from_degraded() {
        let (halves, _peer) = pair();
        let connector = ScriptedConnector::new(vec![None, None, None, None, None, Some(halves)]);
        let (client, mut events) = LiveClient::new(me(), config(), connector.clone());
        client.connect().await;

        loop {
            if let ClientEvent::ConnectivityLimited = next_event(&mut events).await {
                break;
            }
        }
        assert!(client.is_degraded().await);
        assert_eq!(connector.attempts(), 5);

        // Only an explicit connect leaves degraded, with a fresh budget.
        client.connect().await;
        assert!(matches!(
            next_event(&mut events).await,
            ClientEvent::ConnectivityRestored
        ));
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));
        assert!(client.is_connected().await);
        assert_eq!(connector.attempts(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn each_degradation_notifies_once() {
        let connector = ScriptedConnector::new(vec![]);
        let (client, mut events) = LiveClient::new(me(), config(), connector.clone());
        client.connect().await;

        loop {
            if let ClientEvent::ConnectivityLimited = next_event(&mut events).await {
                break;
            }
        }
        assert_eq!(connector.attempts(), 5);

        // An explicit reconnect spends a fresh budget; when that is gone too,
        // the second degradation notifies again.
        client.connect().await;
        loop {
            match next_event(&mut events).await {
                ClientEvent::ConnectivityLimited => break,
                ClientEvent::Error(_) => {}
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(connector.attempts(), 10);
        assert!(client.is_degraded().await);
    }

    #[tokio::test]
    async fn connect_after_teardown_reports_failure() {
        let (halves, _peer) = pair();
        let connector = ScriptedConnector::new(vec![Some(halves)]);
        let (client, mut events) = LiveClient::new(me(), config(), connector.clone());
        assert!(client.connect().await);
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        client.disconnect().await;
        wait_for(&client, LinkState::Disconnected).await;

        // The session is over; the handle says so instead of silently
        // dropping the request.
        assert!(!client.connect().await);
        assert!(!client.is_connected().await);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn join_reaches_the_wire_and_ack_updates_presence() {
        let (halves, mut peer) = pair();
        let connector = ScriptedConnector::new(vec![Some(halves)]);
        let (client, mut events) = LiveClient::new(me(), config(), connector);
        client.connect().await;
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        let room = EventId::new("42");
        assert!(client.join_room(room.clone()).await);

        match peer.recv_message().await {
            ClientMessage::JoinRoom(p) => {
                assert_eq!(p.room_id, room);
                assert_eq!(p.identity, me());
            }
            other => panic!("expected JOIN_ROOM, got {:?}", other),
        }

        peer.send_envelope(ServerEnvelope::new(ServerMessage::JoinRoom(JoinAckPayload {
            room_id: room.clone(),
            success: true,
            members: vec![me(), Identity::new("u2", "Bob")],
        })))
        .await;

        match next_event(&mut events).await {
            ClientEvent::Presence { room_id, members } => {
                assert_eq!(room_id, room);
                assert_eq!(members.len(), 2);
            }
            other => panic!("expected presence, got {:?}", other),
        }
        assert_eq!(client.active_participants().await.len(), 2);
    }

    #[tokio::test]
    async fn rejoins_rooms_after_reconnect() {
        let (halves1, mut peer1) = pair();
        let (halves2, mut peer2) = pair();
        let connector = ScriptedConnector::new(vec![Some(halves1), Some(halves2)]);
        let (client, mut events) = LiveClient::new(me(), config(), connector);
        client.connect().await;
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        assert!(client.join_room(EventId::new("42")).await);
        match peer1.recv_message().await {
            ClientMessage::JoinRoom(_) => {}
            other => panic!("expected JOIN_ROOM, got {:?}", other),
        }

        peer1.hang_up();
        assert!(matches!(
            next_event(&mut events).await,
            ClientEvent::Disconnected
        ));
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        // The new channel gets the join replayed without any caller action.
        match peer2.recv_message().await {
            ClientMessage::JoinRoom(p) => assert_eq!(p.room_id, EventId::new("42")),
            other => panic!("expected replayed JOIN_ROOM, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn calls_fail_fast_while_reconnecting() {
        let connector = ScriptedConnector::new(vec![]);
        let mut cfg = config();
        cfg.retry_delay = Duration::from_secs(300);
        let (client, mut events) = LiveClient::new(me(), cfg, connector);
        client.connect().await;

        assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
        wait_for(&client, LinkState::Reconnecting).await;

        assert!(!client.join_room(EventId::new("42")).await);
        assert!(!client
            .send(ClientMessage::Typing(RelayPayload::new(EventId::new("42"))))
            .await);
        assert!(client.active_participants().await.is_empty());

        client.disconnect().await;
        wait_for(&client, LinkState::Disconnected).await;
    }

    #[tokio::test]
    async fn disconnect_says_goodbye_to_joined_rooms() {
        let (halves, mut peer) = pair();
        let connector = ScriptedConnector::new(vec![Some(halves)]);
        let (client, mut events) = LiveClient::new(me(), config(), connector);
        client.connect().await;
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        assert!(client.join_room(EventId::new("42")).await);
        match peer.recv_message().await {
            ClientMessage::JoinRoom(_) => {}
            other => panic!("expected JOIN_ROOM, got {:?}", other),
        }

        client.disconnect().await;
        match peer.recv_message().await {
            ClientMessage::LeaveRoom(p) => assert_eq!(p.room_id, EventId::new("42")),
            other => panic!("expected LEAVE_ROOM, got {:?}", other),
        }
        assert!(peer.rx.recv().await.is_none());
        wait_for(&client, LinkState::Disconnected).await;
    }

    #[tokio::test]
    async fn relayed_messages_surface_as_events() {
        let (halves, mut peer) = pair();
        let connector = ScriptedConnector::new(vec![Some(halves)]);
        let (client, mut events) = LiveClient::new(me(), config(), connector);
        client.connect().await;
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

        let envelope = ServerEnvelope::new(ServerMessage::ChatMessage(
            RelayPayload::new(EventId::new("42")).with_field("text", "hello".into()),
        ))
        .with_sender(Identity::new("u2", "Bob"));
        peer.send_envelope(envelope).await;

        match next_event(&mut events).await {
            ClientEvent::Message(received) => {
                assert!(matches!(received.message, ServerMessage::ChatMessage(_)));
                assert_eq!(received.sender, Some(Identity::new("u2", "Bob")));
            }
            other => panic!("expected relayed message, got {:?}", other),
        }
    }
}
