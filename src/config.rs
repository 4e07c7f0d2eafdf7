/// Server configuration, loaded from the environment the way the teacher's
/// `main.rs` loads `RUST_LOG`: read a var, fall back to a sane default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Mount point prefix, e.g. "socket.io".
    pub namespace: String,
    /// Overrides the `Access-Control-Allow-Origin` value when set.
    pub cors: Option<String>,
    /// Heartbeat period in seconds.
    pub heartbeat_interval: u64,
    /// Idle session timeout in seconds.
    pub session_expire: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "socket.io".to_string(),
            cors: None,
            heartbeat_interval: 5,
            session_expire: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            namespace: std::env::var("SOCKETIO_NAMESPACE").unwrap_or(default.namespace),
            cors: std::env::var("SOCKETIO_CORS").ok(),
            heartbeat_interval: std::env::var("SOCKETIO_HEARTBEAT_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.heartbeat_interval),
            session_expire: std::env::var("SOCKETIO_SESSION_EXPIRE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_expire),
        }
    }

    /// Transports advertised on the handshake endpoint, in the order the
    /// reference implementation lists them.
    pub fn supported_transports(&self) -> &'static [&'static str] {
        &[
            "websocket",
            "xhr-polling",
            "xhr-multipart",
            "jsonp-polling",
            "htmlfile",
        ]
    }

    pub fn cors_origin(&self) -> &str {
        self.cors.as_deref().unwrap_or("*")
    }
}
