use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSession {
    pub key: String,
    pub created: DateTime<Utc>,
    pub renewed: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
    pub subject_id: String,
    pub session_id: Option<String>,
    pub scheme: String,
    pub ticket: String,
}

impl UserSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserSessionsFilter {
    pub subject_id: Option<String>,
    pub session_id: Option<String>,
}

impl UserSessionsFilter {
    pub fn subject(subject_id: impl Into<String>) -> Self {
        UserSessionsFilter {
            subject_id: Some(subject_id.into()),
            session_id: None,
        }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        UserSessionsFilter {
            subject_id: None,
            session_id: Some(session_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subject_id.is_none() && self.session_id.is_none()
    }

    pub fn matches(&self, session: &UserSession) -> bool {
        if self.is_empty() {
            return false;
        }

        let subject = self
            .subject_id
            .as_ref()
            .is_none_or(|subject_id| *subject_id == session.subject_id);
        let sid = self
            .session_id
            .as_ref()
            .is_none_or(|session_id| session.session_id.as_ref() == Some(session_id));

        subject && sid
    }
}

#[async_trait]
pub trait UserSessionStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn create_user_session(&self, session: UserSession) -> Result<(), Self::Error>;

    async fn get_user_session(&self, key: &str) -> Result<Option<UserSession>, Self::Error>;

    // must not create a record
    async fn update_user_session(&self, session: UserSession) -> Result<(), Self::Error>;

    // an absent key is not an error
    async fn delete_user_session(&self, key: &str) -> Result<(), Self::Error>;

    async fn get_user_sessions(
        &self,
        filter: &UserSessionsFilter,
    ) -> Result<Vec<UserSession>, Self::Error>;

    async fn delete_user_sessions(&self, filter: &UserSessionsFilter) -> Result<(), Self::Error>;
}

#[async_trait]
impl<T> UserSessionStore for Arc<T>
where
    T: UserSessionStore + ?Sized,
{
    type Error = T::Error;

    async fn create_user_session(&self, session: UserSession) -> Result<(), Self::Error> {
        (**self).create_user_session(session).await
    }

    async fn get_user_session(&self, key: &str) -> Result<Option<UserSession>, Self::Error> {
        (**self).get_user_session(key).await
    }

    async fn update_user_session(&self, session: UserSession) -> Result<(), Self::Error> {
        (**self).update_user_session(session).await
    }

    async fn delete_user_session(&self, key: &str) -> Result<(), Self::Error> {
        (**self).delete_user_session(key).await
    }

    async fn get_user_sessions(
        &self,
        filter: &UserSessionsFilter,
    ) -> Result<Vec<UserSession>, Self::Error> {
        (**self).get_user_sessions(filter).await
    }

    async fn delete_user_sessions(&self, filter: &UserSessionsFilter) -> Result<(), Self::Error> {
        (**self).delete_user_sessions(filter).await
    }
}
