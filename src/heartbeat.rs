//! Background tasks that act on a session without prolonging its
//! lifetime: both hold only a `Weak<Session>`, so a session with no
//! remaining transport or application handle is free to drop.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::codec::Packet;
use crate::session::Session;

/// Polls idle time against the expiry deadline and kills the session
/// once it's exceeded. One of these is spawned per session at creation
/// and aborted by `Session::kill`.
pub fn spawn_expiry(session: Weak<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let (remaining, expire) = match session.upgrade() {
                Some(s) => {
                    let idle = s.idle_for();
                    let expire = s.expire();
                    if idle >= expire {
                        tracing::debug!(session = %s.id, "session expired");
                        s.kill();
                        return;
                    }
                    (expire - idle, expire)
                }
                None => return,
            };
            let _ = expire;
            tokio::time::sleep(remaining).await;
        }
    })
}

/// Emits a heartbeat packet into the client-bound queue on a fixed
/// period while the session is connected. Started by whichever
/// transport establishes a live connection (xhr-multipart and
/// websocket; long-polling transports rely on each new GET instead).
pub fn spawn_heartbeat(session: Weak<Session>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match session.upgrade() {
                Some(s) if s.is_connected() => {
                    if s.put_client(Packet::heartbeat()).is_err() {
                        return;
                    }
                }
                Some(_) => return,
                None => return,
            }
        }
    })
}
