use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::store::{UserSession, UserSessionStore, UserSessionsFilter};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("a user session with key {0} already exists")]
    DuplicateKey(String),

    #[error("user session filter must select a subject id or a session id")]
    EmptyFilter,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryUserSessionStore {
    sessions: Arc<RwLock<HashMap<String, UserSession>>>,
}

impl InMemoryUserSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn remove_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();

        sessions.retain(|_, session| !session.is_expired_at(now));

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "expired user sessions removed");
        }

        removed
    }
}

#[async_trait]
impl UserSessionStore for InMemoryUserSessionStore {
    type Error = MemoryStoreError;

    async fn create_user_session(&self, session: UserSession) -> Result<(), Self::Error> {
        match self.sessions.write().entry(session.key.clone()) {
            Entry::Occupied(entry) => Err(MemoryStoreError::DuplicateKey(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    async fn get_user_session(&self, key: &str) -> Result<Option<UserSession>, Self::Error> {
        Ok(self.sessions.read().get(key).cloned())
    }

    async fn update_user_session(&self, session: UserSession) -> Result<(), Self::Error> {
        if let Some(existing) = self.sessions.write().get_mut(&session.key) {
            *existing = session;
        }

        Ok(())
    }

    async fn delete_user_session(&self, key: &str) -> Result<(), Self::Error> {
        self.sessions.write().remove(key);
        Ok(())
    }

    async fn get_user_sessions(
        &self,
        filter: &UserSessionsFilter,
    ) -> Result<Vec<UserSession>, Self::Error> {
        if filter.is_empty() {
            return Err(MemoryStoreError::EmptyFilter);
        }

        Ok(self
            .sessions
            .read()
            .values()
            .filter(|session| filter.matches(session))
            .cloned()
            .collect())
    }

    async fn delete_user_sessions(&self, filter: &UserSessionsFilter) -> Result<(), Self::Error> {
        if filter.is_empty() {
            return Err(MemoryStoreError::EmptyFilter);
        }

        self.sessions
            .write()
            .retain(|_, session| !filter.matches(session));

        Ok(())
    }
}
