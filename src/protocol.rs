//! Thin convenience layer over `Session` + `Codec` for application code:
//! `send`, `emit`, `ack`, `receive`, `broadcast`.

use std::time::Duration;

use crate::codec::{Ack, Packet};
use crate::error::Result;
use crate::registry::Registry;
use crate::session::{ClientMessage, Session, ServerRecv};

use serde_json::Value as JsonValue;

/// A packet, or a raw byte string passed through unchanged — the
/// escape hatch legacy callers use to hand over an already-encoded
/// frame.
pub enum Outbound {
    Packet(Packet),
    Raw(Vec<u8>),
}

impl From<Packet> for Outbound {
    fn from(p: Packet) -> Self {
        Outbound::Packet(p)
    }
}

/// Routes `packet_or_bytes` into the session's client-bound queue. A raw
/// byte string reaches the wire verbatim: it is queued as-is rather than
/// re-wrapped in a `Message` packet, so the transport drain loop writes
/// it unchanged instead of re-encoding it with a `3:::` header.
pub fn send(session: &Session, message: Outbound) -> Result<()> {
    match message {
        Outbound::Packet(p) => session.put_client(ClientMessage::Packet(p)),
        Outbound::Raw(bytes) => session.put_client(ClientMessage::Raw(bytes)),
    }
}

/// Enqueues an Event packet, allocating an ack id from the session's
/// monotonic counter when `need_ack` is set.
pub fn emit(session: &Session, name: &str, args: Vec<JsonValue>, need_ack: bool) -> Result<()> {
    let mut packet = Packet::event(name.to_string(), args);
    if need_ack {
        let id = session.next_ack_id();
        packet = packet.with_header(|h| h.with_id(id).with_ack(Ack::Data));
    }
    session.put_client(packet)
}

/// Enqueues an Ack packet carrying the given arguments.
pub fn ack(session: &Session, ackid: &str, args: Vec<JsonValue>) -> Result<()> {
    session.put_client(Packet::ack(ackid.to_string(), args))
}

/// Dequeues from the server-bound queue.
pub async fn receive(session: &Session, timeout: Option<Duration>) -> ServerRecv {
    session.get_server(timeout).await
}

/// Puts `packet` into every session's client queue except the caller's,
/// unless `include_self` is set. `exceptions` names additional session
/// ids to skip. Sessions in DISCONNECTING/DISCONNECTED are skipped: by
/// the time kill() has run their client queue no longer has a reader.
pub fn broadcast(
    registry: &Registry,
    packet: &Packet,
    caller: &Session,
    exceptions: &[String],
    include_self: bool,
) {
    for (id, target) in registry.iter() {
        if !include_self && id == caller.id {
            continue;
        }
        if exceptions.iter().any(|e| e == &id) {
            continue;
        }
        if !target.is_connected() {
            continue;
        }
        let _ = target.put_client(packet.clone());
    }
}
