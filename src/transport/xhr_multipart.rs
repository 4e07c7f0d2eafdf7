//! XHR multipart streaming: a single long-lived GET whose body is a
//! `multipart/x-mixed-replace` stream, one MIME part per outbound
//! message. POST behaves exactly like XHR long-polling's POST.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::Method;
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use futures::stream;
use futures::StreamExt;

use super::base::cors_headers;
use crate::codec::Packet;
use crate::error::{Error, Result};
use crate::heartbeat::spawn_heartbeat;
use crate::session::{ClientRecv, Session};

const BOUNDARY: &str = "socketio";

pub async fn handle(
    method: &Method,
    session: &Arc<Session>,
    body: &[u8],
    heartbeat_interval: Duration,
    cors_origin: &str,
) -> Result<HttpResponse> {
    match *method {
        Method::GET => Ok(get(session, heartbeat_interval, cors_origin)),
        Method::POST => post(session, body, cors_origin),
        Method::OPTIONS => Ok(options(cors_origin)),
        ref other => Err(Error::MethodNotAllowed(other.to_string())),
    }
}

fn get(session: &Arc<Session>, heartbeat_interval: Duration, cors_origin: &str) -> HttpResponse {
    // The GET that opens this stream *is* the handshake for this
    // transport: the first part carries the session id in place of the
    // bare Connect frame the polling transports use.
    session.confirm_connection();
    let first_part = session.id.clone().into_bytes();
    spawn_heartbeat(Arc::downgrade(session), heartbeat_interval);

    let session = session.clone();
    let first = stream::once(futures::future::ready(Ok::<Bytes, Error>(Bytes::from(
        mime_part(&first_part),
    ))));
    let rest = stream::unfold(session, |session| async move {
        match session.get_client(None).await {
            ClientRecv::Packet(p) => Some((Ok(Bytes::from(mime_part(&p.encode()))), session)),
            ClientRecv::Raw(b) => Some((Ok(Bytes::from(mime_part(&b))), session)),
            ClientRecv::Close => {
                session.kill();
                None
            }
            ClientRecv::Empty => unreachable!("get_client(None) never times out"),
        }
    });

    let mut builder = HttpResponse::Ok();
    cors_headers(&mut builder, cors_origin);
    builder
        .content_type(format!(r#"multipart/x-mixed-replace; boundary="{BOUNDARY}""#))
        .streaming(first.chain(rest))
}

fn post(session: &Session, body: &[u8], cors_origin: &str) -> Result<HttpResponse> {
    let packet = Packet::decode(body).map_err(|e| {
        session.kill();
        e
    })?;
    let is_disconnect = matches!(packet, Packet::Disconnect { .. });
    session.put_server(packet)?;
    if is_disconnect {
        session.kill();
    }
    let mut builder = HttpResponse::Ok();
    cors_headers(&mut builder, cors_origin);
    builder.insert_header(("Connection", "close"));
    Ok(builder.body("1"))
}

fn options(cors_origin: &str) -> HttpResponse {
    let mut builder = HttpResponse::Ok();
    cors_headers(&mut builder, cors_origin);
    builder.finish()
}

fn mime_part(payload: &[u8]) -> Vec<u8> {
    let mut part = format!("--{BOUNDARY}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n").into_bytes();
    part.extend_from_slice(payload);
    part.extend_from_slice(b"\r\n");
    part
}
