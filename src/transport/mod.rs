//! The five wire transports, each binding a `Session`'s two queues to
//! an HTTP request or WebSocket connection.

pub mod base;
pub mod htmlfile;
pub mod jsonp_polling;
pub mod websocket;
pub mod xhr_multipart;
pub mod xhr_polling;

pub use base::cors_headers;
