//! XHR long-polling: each GET drains one message (or times out to a
//! Noop), each POST enqueues one frame.

use actix_web::http::Method;
use actix_web::HttpResponse;

use super::base::{cors_headers, handshake_frame, POLL_TIMEOUT};
use crate::codec::Packet;
use crate::error::{Error, Result};
use crate::session::{ClientRecv, Session};

pub async fn handle(method: &Method, session: &Session, body: &[u8], cors_origin: &str) -> Result<HttpResponse> {
    if let Some(frame) = handshake_frame(session) {
        let mut builder = HttpResponse::Ok();
        cors_headers(&mut builder, cors_origin);
        return Ok(builder.body(frame));
    }

    match *method {
        Method::GET => Ok(get(session, cors_origin).await),
        Method::POST => post(session, body, cors_origin),
        Method::OPTIONS => Ok(options(cors_origin)),
        ref other => Err(Error::MethodNotAllowed(other.to_string())),
    }
}

async fn get(session: &Session, cors_origin: &str) -> HttpResponse {
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
    builder.body(bytes)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use actix_web::body::to_bytes;
    use std::time::Duration;

    #[actix_web::test]
    async fn first_request_on_any_method_returns_bare_connect_frame() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();

        let resp = handle(&Method::GET, &session, b"", "*").await.unwrap();
        assert!(session.connection_confirmed());
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body.as_ref(), b"1::");
    }

    #[actix_web::test]
    async fn post_echoes_with_body_one_and_enqueues_server_side() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.confirm_connection();
        session.touch();

        let resp = handle(&Method::POST, &session, b"3:::hello", "*").await.unwrap();
        assert_eq!(resp.headers().get("Connection").unwrap(), "close");
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body.as_ref(), b"1");

        match session.get_server(None).await {
            crate::session::ServerRecv::Packet(Packet::Message { data, .. }) => {
                assert_eq!(data, b"hello")
            }
            _ => panic!("expected Message packet on server queue"),
        }
    }

    #[actix_web::test]
    async fn get_drains_a_queued_packet_before_the_poll_timeout() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.confirm_connection();
        session.touch();
        session.put_client(Packet::message("hi")).unwrap();

        let resp = handle(&Method::GET, &session, b"", "*").await.unwrap();
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body.as_ref(), b"3:::hi");
    }
}
