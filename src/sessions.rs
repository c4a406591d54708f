use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::session::Session;

/// In-memory session store keyed by the `session_id` cookie value.
///
/// Short sessions last 30 minutes, persistent ("remember me") sessions
/// 10 days. Expired entries are dropped lazily on validation.
pub struct SessionStore {
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, username: &str, remember_me: bool) -> Session {
        let expires_at = if remember_me {
            Utc::now() + Duration::days(10)
        } else {
            Utc::now() + Duration::minutes(30)
        };
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            expires_at,
            is_persistent: remember_me,
        };
        let mut sessions = self.inner.lock().unwrap();
        // One session per user: replace any previous one
        sessions.retain(|_, s| s.username != username);
        sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    /// Returns the username bound to a live session, dropping it if expired.
    pub fn validate(&self, session_id: &str) -> Option<String> {
        let mut sessions = self.inner.lock().unwrap();
        match sessions.get(session_id) {
            Some(s) if s.expires_at > Utc::now() => Some(s.username.clone()),
            Some(_) => {
                sessions.remove(session_id);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.inner.lock().unwrap().remove(session_id).is_some()
    }

    pub fn clear(&self) -> usize {
        let mut sessions = self.inner.lock().unwrap();
        let n = sessions.len();
        sessions.clear();
        n
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_validate() {
        let store = SessionStore::new();
        let session = store.create("admin", false);
        assert_eq!(store.validate(&session.session_id).as_deref(), Some("admin"));
        assert!(store.remove(&session.session_id));
        assert!(store.validate(&session.session_id).is_none());
    }

    #[test]
    fn expired_session_is_rejected_and_dropped() {
        let store = SessionStore::new();
        let session = store.create("admin", true);
        {
            let mut sessions = store.inner.lock().unwrap();
            if let Some(s) = sessions.get_mut(&session.session_id) {
                s.expires_at = Utc::now() - Duration::minutes(1);
            }
        }
        assert!(store.validate(&session.session_id).is_none());
        // dropped on validation, not merely hidden
        assert!(store.inner.lock().unwrap().is_empty());
    }

    #[test]
    fn relogin_replaces_previous_session() {
        let store = SessionStore::new();
        let first = store.create("admin", false);
        let second = store.create("admin", true);
        assert!(store.validate(&first.session_id).is_none());
        assert_eq!(store.validate(&second.session_id).as_deref(), Some("admin"));
    }

    #[test]
    fn clear_drops_everything() {
        let store = SessionStore::new();
        store.create("admin", false);
        store.create("operativa", false);
        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
    }
}
