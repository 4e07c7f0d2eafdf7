//! Per-client session runtime: lifecycle, expiry, and the two message
//! queues that decouple inbound and outbound flows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::codec::Packet;
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Depth of each direction's queue. Puts are non-blocking (§5: no
/// suspension point on put), so once full a put is dropped rather than
/// awaited — the channel is sized generously to make that the unusual
/// case. See DESIGN.md for the reasoning.
const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    Connected,
    Disconnecting,
    Disconnected,
}

/// An item destined for the client-bound queue: either a typed packet
/// to encode on the way out, or an already-encoded byte string passed
/// through verbatim — the escape hatch legacy callers use to hand over
/// a frame that must reach the wire unchanged.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Packet(Packet),
    Raw(Vec<u8>),
}

impl From<Packet> for ClientMessage {
    fn from(packet: Packet) -> Self {
        ClientMessage::Packet(packet)
    }
}

/// Result of a bounded dequeue from the client-bound queue.
pub enum ClientRecv {
    Packet(Packet),
    /// An already-encoded frame, to be written to the wire unchanged.
    Raw(Vec<u8>),
    /// The shutdown sentinel: the consuming transport must close.
    Close,
    /// The deadline elapsed before a message arrived.
    Empty,
}

/// Result of a bounded dequeue from the server-bound queue.
pub enum ServerRecv {
    Packet(Packet),
    Empty,
}

struct Inner {
    state: State,
    connection_confirmed: bool,
    timestamp: Instant,
}

/// Server-side state for one logical client connection.
pub struct Session {
    pub id: String,
    inner: Mutex<Inner>,
    client_tx: mpsc::Sender<Option<ClientMessage>>,
    client_rx: AsyncMutex<mpsc::Receiver<Option<ClientMessage>>>,
    server_tx: mpsc::Sender<Packet>,
    server_rx: AsyncMutex<mpsc::Receiver<Packet>>,
    registry: Weak<Registry>,
    expire: Duration,
    expiry_task: Mutex<Option<JoinHandle<()>>>,
    ack_counter: AtomicU64,
}

impl Session {
    pub(crate) fn new(id: String, expire: Duration, registry: Weak<Registry>) -> std::sync::Arc<Self> {
        let (client_tx, client_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (server_tx, server_rx) = mpsc::channel(QUEUE_CAPACITY);
        let session = std::sync::Arc::new(Self {
            id,
            inner: Mutex::new(Inner {
                state: State::New,
                connection_confirmed: false,
                timestamp: Instant::now(),
            }),
            client_tx,
            client_rx: AsyncMutex::new(client_rx),
            server_tx,
            server_rx: AsyncMutex::new(server_rx),
            registry,
            expire,
            expiry_task: Mutex::new(None),
            ack_counter: AtomicU64::new(1),
        });
        let handle = crate::heartbeat::spawn_expiry(std::sync::Arc::downgrade(&session));
        *session.expiry_task.lock().unwrap() = Some(handle);
        session
    }

    pub fn state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == State::Connected
    }

    pub fn connection_confirmed(&self) -> bool {
        self.inner.lock().unwrap().connection_confirmed
    }

    pub fn confirm_connection(&self) {
        self.inner.lock().unwrap().connection_confirmed = true;
    }

    pub fn next_ack_id(&self) -> String {
        self.ack_counter.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Update timestamp to max(now, current); if NEW, transition to
    /// CONNECTED. Idempotent.
    pub fn touch(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        if now > inner.timestamp {
            inner.timestamp = now;
        }
        if inner.state == State::New {
            inner.state = State::Connected;
        }
    }

    /// Alias of `touch()`, invoked on inbound heartbeat packets.
    pub fn heartbeat(&self) {
        self.touch();
    }

    fn is_open(&self) -> bool {
        matches!(self.state(), State::New | State::Connected)
    }

    /// Non-blocking enqueue onto the client-bound (server -> client) queue.
    /// Accepts either a `Packet` to encode on drain, or a `ClientMessage`
    /// carrying an already-encoded frame that must reach the wire as-is.
    pub fn put_client(&self, message: impl Into<ClientMessage>) -> Result<()> {
        self.touch();
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        if self.client_tx.try_send(Some(message.into())).is_err() {
            tracing::warn!(session = %self.id, "client queue full, dropping packet");
        }
        Ok(())
    }

    /// Non-blocking enqueue onto the server-bound (client -> server) queue.
    pub fn put_server(&self, packet: Packet) -> Result<()> {
        self.touch();
        if !self.is_open() {
            return Err(Error::SessionClosed);
        }
        if self.server_tx.try_send(packet).is_err() {
            tracing::warn!(session = %self.id, "server queue full, dropping packet");
        }
        Ok(())
    }

    /// Blocking dequeue from the client-bound queue with an optional
    /// deadline.
    pub async fn get_client(&self, timeout: Option<Duration>) -> ClientRecv {
        let mut rx = self.client_rx.lock().await;
        let recv = match timeout {
            Some(d) => match tokio::time::timeout(d, rx.recv()).await {
                Ok(v) => v,
                Err(_) => return ClientRecv::Empty,
            },
            None => rx.recv().await,
        };
        match recv {
            Some(Some(ClientMessage::Packet(packet))) => ClientRecv::Packet(packet),
            Some(Some(ClientMessage::Raw(bytes))) => ClientRecv::Raw(bytes),
            Some(None) | None => ClientRecv::Close,
        }
    }

    /// Blocking dequeue from the server-bound queue with an optional
    /// deadline.
    pub async fn get_server(&self, timeout: Option<Duration>) -> ServerRecv {
        let mut rx = self.server_rx.lock().await;
        let recv = match timeout {
            Some(d) => match tokio::time::timeout(d, rx.recv()).await {
                Ok(v) => v,
                Err(_) => return ServerRecv::Empty,
            },
            None => rx.recv().await,
        };
        match recv {
            Some(packet) => ServerRecv::Packet(packet),
            None => ServerRecv::Empty,
        }
    }

    /// Idempotent teardown: enqueue Disconnect/sentinel, cancel expiry,
    /// deregister from the Registry.
    pub fn kill(&self) {
        let was_connected = {
            let mut inner = self.inner.lock().unwrap();
            match inner.state {
                State::Connected => {
                    inner.state = State::Disconnecting;
                    true
                }
                State::New => {
                    // Never attached to anything; nobody is listening on
                    // either queue yet, so there's nothing to drain.
                    inner.state = State::Disconnected;
                    false
                }
                State::Disconnecting | State::Disconnected => return,
            }
        };

        if was_connected {
            let _ = self.server_tx.try_send(Packet::disconnect());
            let _ = self.client_tx.try_send(None);
        }

        if let Some(handle) = self.expiry_task.lock().unwrap().take() {
            handle.abort();
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }

        self.inner.lock().unwrap().state = State::Disconnected;
    }

    /// Seconds since last activity, used by the expiry task.
    pub(crate) fn idle_for(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        Instant::now().saturating_duration_since(inner.timestamp)
    }

    pub(crate) fn expire(&self) -> Duration {
        self.expire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[tokio::test]
    async fn touch_transitions_new_to_connected() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        assert_eq!(session.state(), State::New);
        session.touch();
        assert_eq!(session.state(), State::Connected);
    }

    #[tokio::test]
    async fn kill_on_new_session_is_silent() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.kill();
        assert_eq!(session.state(), State::Disconnected);
        assert!(registry.get(&session.id).is_none());
    }

    #[tokio::test]
    async fn kill_is_idempotent() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.touch();
        session.kill();
        session.kill();
        assert_eq!(session.state(), State::Disconnected);
    }

    #[tokio::test]
    async fn kill_enqueues_disconnect_and_sentinel() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.touch();
        session.kill();

        match session.get_server(None).await {
            ServerRecv::Packet(Packet::Disconnect { .. }) => {}
            _ => panic!("expected Disconnect packet"),
        }
        match session.get_client(None).await {
            ClientRecv::Close => {}
            _ => panic!("expected shutdown sentinel"),
        }
    }

    #[tokio::test]
    async fn put_after_kill_is_session_closed() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.touch();
        session.kill();
        assert!(matches!(session.put_client(Packet::heartbeat()), Err(Error::SessionClosed)));
        assert!(matches!(session.put_server(Packet::heartbeat()), Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn get_client_empty_on_timeout() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        match session.get_client(Some(Duration::from_millis(10))).await {
            ClientRecv::Empty => {}
            _ => panic!("expected Empty"),
        }
    }
}
