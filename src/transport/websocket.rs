//! WebSocket transport: a full-duplex pair of tasks bound to the
//! session's two queues. Either task exiting kills the session, which
//! promptly unblocks the other.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures_util::StreamExt;

use crate::codec::Packet;
use crate::heartbeat::spawn_heartbeat;
use crate::session::{ClientRecv, Session};

pub fn handle(
    req: &HttpRequest,
    body: web::Payload,
    session: Arc<Session>,
    heartbeat_interval: Duration,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(req, body)?;

    session.confirm_connection();
    let connect_frame = Packet::connect(crate::codec::QueryString::new()).encode();
    let mut handshake_sender = ws_session.clone();
    actix_web::rt::spawn(async move {
        let _ = handshake_sender
            .text(String::from_utf8_lossy(&connect_frame).into_owned())
            .await;
    });

    spawn_heartbeat(Arc::downgrade(&session), heartbeat_interval);

    let inbound_session = session.clone();
    actix_web::rt::spawn(async move {
        while let Some(msg) = msg_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match Packet::decode(text.as_bytes()) {
                    Ok(Packet::Heartbeat { .. }) => inbound_session.heartbeat(),
                    Ok(Packet::Disconnect { .. }) => break,
                    Ok(packet) => {
                        if inbound_session.put_server(packet).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(session = %inbound_session.id, error = %e, "malformed inbound frame");
                        break;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(bytes)) => {
                    inbound_session.touch();
                    let _ = bytes;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        inbound_session.kill();
    });

    let outbound_session = session;
    actix_web::rt::spawn(async move {
        loop {
            match outbound_session.get_client(None).await {
                ClientRecv::Packet(packet) => {
                    let frame = String::from_utf8_lossy(&packet.encode()).into_owned();
                    if ws_session.text(frame).await.is_err() {
                        outbound_session.kill();
                        break;
                    }
                }
                ClientRecv::Raw(bytes) => {
                    let frame = String::from_utf8_lossy(&bytes).into_owned();
                    if ws_session.text(frame).await.is_err() {
                        outbound_session.kill();
                        break;
                    }
                }
                ClientRecv::Close => {
                    let _ = ws_session.close(None).await;
                    break;
                }
                ClientRecv::Empty => unreachable!("get_client(None) never times out"),
            }
        }
    });

    Ok(response)
}
