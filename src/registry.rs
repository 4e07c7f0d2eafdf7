//! Owns every live `Session` by id. Sessions remove themselves on
//! `kill()` via a weak back-reference; nothing else ever deletes an
//! entry directly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use uuid::Uuid;

use crate::session::Session;

pub struct Registry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    session_expire: Duration,
    pub heartbeat_interval: Duration,
}

impl Registry {
    pub fn new(session_expire: Duration, heartbeat_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            session_expire,
            heartbeat_interval,
        })
    }

    /// Allocate a fresh session id and register it. The session is NEW
    /// until the first `touch()`.
    pub fn create(self: &Arc<Self>) -> Arc<Session> {
        let id = Uuid::new_v4().simple().to_string();
        let session = Session::new(id.clone(), self.session_expire, Arc::downgrade(self));
        self.sessions.write().unwrap().insert(id, session.clone());
        tracing::debug!(session = %session.id, "session created");
        session
    }

    /// Look up a session by id, touching it on a hit. Does not
    /// distinguish "never existed" from "expired and removed" — both
    /// surface as `None`, matching spec.md's UnknownSession handling.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().unwrap().get(id).cloned();
        if let Some(ref s) = session {
            s.touch();
        }
        session
    }

    pub fn remove(&self, id: &str) {
        if self.sessions.write().unwrap().remove(id).is_some() {
            tracing::debug!(session = %id, "session removed");
        }
    }

    /// Snapshot of (id, session) pairs, used by `protocol::broadcast`.
    pub fn iter(&self) -> Vec<(String, Arc<Session>)> {
        self.sessions
            .read()
            .unwrap()
            .iter()
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_returns_same_session() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        let fetched = registry.get(&session.id).expect("session present");
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn get_unknown_id_is_none() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        assert!(registry.get("does-not-exist").is_none());
    }

    #[tokio::test]
    async fn kill_removes_from_registry() {
        let registry = Registry::new(Duration::from_secs(10), Duration::from_secs(5));
        let session = registry.create();
        session.touch();
        let id = session.id.clone();
        session.kill();
        assert!(registry.get(&id).is_none());
    }
}
