//! HTMLFile streaming: `multipart/x-mixed-replace`'s IE-era cousin.
//! Same drain loop as xhr-multipart, but each message is wrapped as a
//! `<script>` fragment in a chunked HTML document.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::Method;
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use futures::stream;
use futures::StreamExt;

use super::base::{cors_headers, handshake_frame};
use crate::codec::Packet;
use crate::error::{Error, Result};
use crate::heartbeat::spawn_heartbeat;
use crate::session::{ClientRecv, Session};

/// Padding target for the first chunk, to defeat IE's content-sniffing
/// buffer before it starts rendering script tags.
const MIN_FIRST_CHUNK: usize = 244;

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
    let first_part = handshake_frame(session).unwrap_or_else(|| Packet::noop().encode());
    spawn_heartbeat(Arc::downgrade(session), heartbeat_interval);

    let session = session.clone();
    let first = stream::once(futures::future::ready(Ok::<Bytes, Error>(Bytes::from(
        opening_chunk(&first_part),
    ))));
    let rest = stream::unfold(session, |session| async move {
        match session.get_client(None).await {
            ClientRecv::Packet(p) => Some((Ok(Bytes::from(script_chunk(&p.encode()))), session)),
            ClientRecv::Raw(b) => Some((Ok(Bytes::from(script_chunk(&b))), session)),
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
        .content_type("text/html; charset=UTF-8")
        .insert_header(("Transfer-Encoding", "chunked"))
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

fn script_chunk(payload: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(payload);
    let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
    format!("<script>parent.s._('{escaped}', document);</script>").into_bytes()
}

fn opening_chunk(first_part: &[u8]) -> Vec<u8> {
    let mut chunk = b"<html><body>".to_vec();
    while chunk.len() < MIN_FIRST_CHUNK {
        chunk.push(b' ');
    }
    chunk.extend_from_slice(&script_chunk(first_part));
    chunk
}
