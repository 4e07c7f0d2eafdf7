//! JSONP polling: identical to XHR long-polling except for the request
//! body's `d="…"` unwrap and the response's `io.j[i]('…')` wrap.

use actix_web::http::Method;
use actix_web::HttpResponse;

use super::base::{cors_headers, handshake_frame, POLL_TIMEOUT};
use crate::codec::Packet;
use crate::error::{Error, Result};
use crate::session::{ClientRecv, Session};

pub async fn handle(
    method: &Method,
    session: &Session,
    body: &[u8],
    index: &str,
    cors_origin: &str,
) -> Result<HttpResponse> {
    if let Some(frame) = handshake_frame(session) {
        let mut builder = HttpResponse::Ok();
        cors_headers(&mut builder, cors_origin);
        return Ok(builder.body(wrap(index, &frame)));
    }

    match *method {
        Method::GET => Ok(get(session, index, cors_origin).await),
        Method::POST => post(session, body, cors_origin),
        Method::OPTIONS => Ok(options(cors_origin)),
        ref other => Err(Error::MethodNotAllowed(other.to_string())),
    }
}

async fn get(session: &Session, index: &str, cors_origin: &str) -> HttpResponse {
    let bytes = match session.get_client(Some(POLL_TIMEOUT)).await {
        ClientRecv::Packet(p) => p.encode(),
        ClientRecv::Raw(b) => b,
        ClientRecv::Close => {
            session.kill();
            Packet::noop().encode()
        }
        ClientRecv::Empty => Packet::noop().encode(),
    };
    let mut builder = HttpResponse::Ok();
    cors_headers(&mut builder, cors_origin);
    builder
        .content_type("text/javascript; charset=UTF-8")
        .body(wrap(index, &bytes))
}

fn post(session: &Session, body: &[u8], cors_origin: &str) -> Result<HttpResponse> {
    let unwrapped = unwrap(body);
    let packet = Packet::decode(&unwrapped).map_err(|e| {
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

/// Strips the `d="…"` wrapper and unescapes `\"`.
fn unwrap(body: &[u8]) -> Vec<u8> {
    let decoded: Vec<u8> = urlencoding::decode_binary(body).into_owned();
    let inner = decoded
        .strip_prefix(b"d=\"")
        .and_then(|rest| rest.strip_suffix(b"\""))
        .unwrap_or(&decoded);
    let mut out = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter().peekable();
    while let Some(&b) = bytes.next() {
        if b == b'\\' {
            if let Some(&&next) = bytes.peek() {
                if next == b'"' {
                    out.push(b'"');
                    bytes.next();
                    continue;
                }
            }
        }
        out.push(b);
    }
    out
}

/// Wraps `payload` as `io.j[<index>]('<escaped payload>');`.
fn wrap(index: &str, payload: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(payload);
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\'' => escaped.push_str("\\'"),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    format!("io.j[{index}]('{escaped}');").into_bytes()
}
