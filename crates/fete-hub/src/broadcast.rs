//! Best-effort fan-out of one envelope to every live transport in a room.

use fete_protocol::ServerEnvelope;

use crate::registry::{ConnectionRegistry, Outbound, RoomTx};

/// Send to every member's transport. Closed or backed-up transports are
/// silently skipped — cleanup of dead connections belongs to the close
/// handler, not the broadcaster.
pub fn broadcast(registry: &ConnectionRegistry, members: &[String], envelope: &ServerEnvelope) {
    let Ok(json) = serde_json::to_string(envelope) else {
        return;
    };
    for identity_id in members {
        let Some(conn) = registry.get(identity_id) else {
            continue;
        };
        if conn.transport.is_closed() {
            continue;
        }
        if conn.transport.try_send(Outbound::Frame(json.clone())).is_err() {
            tracing::debug!(identity = %identity_id, "dropping frame for backed-up transport");
        }
    }
}

/// Send to exactly one transport — acknowledgments and errors.
pub fn unicast(transport: &RoomTx, envelope: &ServerEnvelope) {
    if let Ok(json) = serde_json::to_string(envelope) {
        if transport.try_send(Outbound::Frame(json)).is_err() {
            tracing::debug!("unicast dropped, transport gone");
        }
    }
}
