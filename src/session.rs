//! Session store boundary.
//!
//! Session persistence is an external collaborator: the dispatcher calls
//! [`SessionStore::load`] after building the controller and
//! [`SessionStore::save`] after the after-filter chain, keyed by the
//! `_session_id` cookie. Hook failures are logged and treated as non-fatal
//! no-ops; the no-op store is itself a valid implementation of both hooks.

use dashmap::DashMap;
use std::collections::HashMap;

/// Cookie name carrying the session id.
pub const SESSION_ID_KEY: &str = "_session_id";

/// Opaque per-request session data.
pub type Session = HashMap<String, String>;

/// Key/value session persistence keyed by a cookie session id.
pub trait SessionStore: Send + Sync {
    /// Load the session for the given id. No id or no stored entry yields a
    /// fresh empty session.
    fn load(&self, _session_id: Option<&str>) -> anyhow::Result<Session> {
        Ok(Session::new())
    }

    /// Persist the session under the given id. Called once per request after
    /// the after-filter chain.
    fn save(&self, _session_id: Option<&str>, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Discards everything. The default store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionStore;

impl SessionStore for NoopSessionStore {}

/// Process-local in-memory store. Sessions live until the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Session>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: Option<&str>) -> anyhow::Result<Session> {
        Ok(session_id
            .and_then(|id| self.entries.get(id).map(|e| e.value().clone()))
            .unwrap_or_default())
    }

    fn save(&self, session_id: Option<&str>, session: &Session) -> anyhow::Result<()> {
        if let Some(id) = session_id {
            self.entries.insert(id.to_string(), session.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_store_round_trip() {
        let store = NoopSessionStore;
        let mut session = store.load(Some("abc")).unwrap();
        session.insert("user_id".to_string(), "7".to_string());
        store.save(Some("abc"), &session).unwrap();
        assert!(store.load(Some("abc")).unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let mut session = store.load(Some("abc")).unwrap();
        assert!(session.is_empty());
        session.insert("user_id".to_string(), "7".to_string());
        store.save(Some("abc"), &session).unwrap();
        assert_eq!(
            store.load(Some("abc")).unwrap().get("user_id").map(String::as_str),
            Some("7")
        );
    }

    #[test]
    fn test_memory_store_ignores_missing_id() {
        let store = MemorySessionStore::new();
        store.save(None, &Session::new()).unwrap();
        assert!(store.is_empty());
    }
}
