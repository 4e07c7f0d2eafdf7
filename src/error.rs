use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Errors surfaced by the codec, the session runtime, and the transports.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed packet: {0}")]
    Decode(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot encode value: {0}")]
    Encode(String),

    #[error("unsupported method: {0}")]
    MethodNotAllowed(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Decode(_) => StatusCode::BAD_REQUEST,
            Error::SessionClosed => StatusCode::GONE,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::UnknownSession(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(("Access-Control-Allow-Origin", "*"))
            .insert_header(("Access-Control-Allow-Credentials", "true"))
            .body(self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
