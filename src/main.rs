use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use socketio_core::codec::Packet;
use socketio_core::config::Config;
use socketio_core::error::{Error, Result};
use socketio_core::transport::{htmlfile, jsonp_polling, websocket, xhr_multipart, xhr_polling};
use socketio_core::AppState;

async fn handshake(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let session = state.registry.create();
    let transports = state.config.supported_transports().join(",");
    let body = format!(
        "{}:{}:{}:{}",
        session.id, state.config.heartbeat_interval, state.config.session_expire, transports
    );
    let mut builder = HttpResponse::Ok();
    socketio_core::transport::cors_headers(&mut builder, state.config.cors_origin());
    builder.body(body)
}

async fn dispatch(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    mut payload: web::Payload,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse> {
    let (transport, sid) = path.into_inner();
    let session = state
        .registry
        .get(&sid)
        .ok_or_else(|| Error::UnknownSession(sid.clone()))?;
    let cors_origin = state.config.cors_origin();

    if transport == "websocket" {
        return websocket::handle(&req, payload, session, std::time::Duration::from_secs(state.config.heartbeat_interval))
            .map_err(|e| Error::Transport(e.to_string()));
    }

    let mut buf = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        buf.extend_from_slice(&chunk.map_err(|e| Error::Transport(e.to_string()))?);
    }
    let body = buf.freeze();

    let method = req.method().clone();
    match transport.as_str() {
        "xhr-polling" => xhr_polling::handle(&method, &session, &body, cors_origin).await,
        "jsonp-polling" => {
            let index = web::Query::<std::collections::HashMap<String, String>>::from_query(req.query_string())
                .ok()
                .and_then(|q| q.get("i").cloned())
                .unwrap_or_else(|| "0".to_string());
            jsonp_polling::handle(&method, &session, &body, &index, cors_origin).await
        }
        "xhr-multipart" => {
            xhr_multipart::handle(
                &method,
                &session,
                &body,
                std::time::Duration::from_secs(state.config.heartbeat_interval),
                cors_origin,
            )
            .await
        }
        "htmlfile" => {
            htmlfile::handle(
                &method,
                &session,
                &body,
                std::time::Duration::from_secs(state.config.heartbeat_interval),
                cors_origin,
            )
            .await
        }
        other => {
            let _ = session.put_client(Packet::error("transport not supported", "reconnect"));
            session.kill();
            Err(Error::Transport(format!("unsupported transport: {other}")))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let namespace = config.namespace.clone();
    let state = AppState::new(config);

    let handshake_path = format!("/{namespace}/1/");
    let transport_path = format!("/{namespace}/1/{{transport}}/{{sid}}");

    tracing::info!(%namespace, "starting socketio-server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route(&handshake_path, web::get().to(handshake))
            .route(&transport_path, web::route().to(dispatch))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await?;
    Ok(())
}
