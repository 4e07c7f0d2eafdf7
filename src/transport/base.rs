//! Behavior shared by every transport: CORS headers and the
//! first-GET-confirms-the-session short circuit.

use actix_web::HttpResponseBuilder;
use std::time::Duration;

use crate::codec::{Packet, QueryString};
use crate::session::Session;

/// The poll interval long-polling GETs wait before substituting a Noop.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

pub fn cors_headers(builder: &mut HttpResponseBuilder, origin: &str) -> &mut HttpResponseBuilder {
    builder
        .insert_header(("Access-Control-Allow-Origin", origin.to_string()))
        .insert_header(("Access-Control-Allow-Credentials", "true"))
        .insert_header(("Access-Control-Allow-Methods", "POST, GET, OPTIONS"))
        .insert_header(("Access-Control-Max-Age", "3600"))
}

/// If this session has never been confirmed, this is the handshake
/// request for it: build the bare Connect frame and flip
/// `connection_confirmed`. Returns `None` when the session was already
/// confirmed, meaning the caller should proceed to its normal
/// transport-specific dispatch.
pub fn handshake_frame(session: &Session) -> Option<Vec<u8>> {
    if session.connection_confirmed() {
        return None;
    }
    session.confirm_connection();
    Some(Packet::connect(QueryString::new()).encode())
}
