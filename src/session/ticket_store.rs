use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};

use super::store::{UserSession, UserSessionStore, UserSessionsFilter};
use super::ticket::{AuthenticationTicket, TicketError};

const KEY_BYTES: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum TicketStoreError<E> {
    #[error(transparent)]
    Store(E),

    #[error("failed to serialize authentication ticket")]
    Serialize(#[source] TicketError),
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    type Error;

    async fn store(&self, ticket: &AuthenticationTicket) -> Result<String, Self::Error>;

    async fn retrieve(&self, key: &str) -> Result<Option<AuthenticationTicket>, Self::Error>;

    async fn renew(&self, key: &str, ticket: &AuthenticationTicket) -> Result<(), Self::Error>;

    async fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

#[derive(Clone, Debug)]
pub struct ServerSideTicketStore<S> {
    store: S,
}

impl<S: UserSessionStore> ServerSideTicketStore<S> {
    pub fn new(store: S) -> Self {
        ServerSideTicketStore { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub async fn sessions_for(
        &self,
        filter: &UserSessionsFilter,
    ) -> Result<Vec<UserSession>, TicketStoreError<S::Error>> {
        self.store
            .get_user_sessions(filter)
            .await
            .map_err(TicketStoreError::Store)
    }

    pub async fn revoke(&self, filter: &UserSessionsFilter) -> Result<(), TicketStoreError<S::Error>> {
        debug!(?filter, "revoking user sessions");

        self.store
            .delete_user_sessions(filter)
            .await
            .map_err(TicketStoreError::Store)
    }
}

#[async_trait]
impl<S: UserSessionStore> TicketStore for ServerSideTicketStore<S> {
    type Error = TicketStoreError<S::Error>;

    async fn store(&self, ticket: &AuthenticationTicket) -> Result<String, Self::Error> {
        let key = generate_key();
        let issued = ticket.issued_or_now();

        let session = UserSession {
            key: key.clone(),
            created: issued,
            renewed: issued,
            expires: ticket.expires,
            subject_id: ticket.subject_id().to_owned(),
            session_id: ticket.session_id().map(ToOwned::to_owned),
            scheme: ticket.scheme.clone(),
            ticket: ticket.serialize().map_err(TicketStoreError::Serialize)?,
        };

        self.store
            .create_user_session(session)
            .await
            .map_err(TicketStoreError::Store)?;

        debug!(subject_id = ticket.subject_id(), "user session created");

        Ok(key)
    }

    async fn retrieve(&self, key: &str) -> Result<Option<AuthenticationTicket>, Self::Error> {
        let Some(session) = self
            .store
            .get_user_session(key)
            .await
            .map_err(TicketStoreError::Store)?
        else {
            return Ok(None);
        };

        match AuthenticationTicket::deserialize(&session.ticket) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(error) => {
                warn!(
                    key,
                    %error,
                    "failed to deserialize authentication ticket from store, deleting record"
                );
                self.remove(key).await?;

                Ok(None)
            }
        }
    }

    async fn renew(&self, key: &str, ticket: &AuthenticationTicket) -> Result<(), Self::Error> {
        let Some(mut session) = self
            .store
            .get_user_session(key)
            .await
            .map_err(TicketStoreError::Store)?
        else {
            warn!(
                key,
                subject_id = ticket.subject_id(),
                "no user session found when renewing authentication ticket"
            );
            return Ok(());
        };

        // subject and session id stay bound to the record
        session.renewed = ticket.issued_or_now().max(session.created);
        session.expires = ticket.expires;
        session.ticket = ticket.serialize().map_err(TicketStoreError::Serialize)?;

        self.store
            .update_user_session(session)
            .await
            .map_err(TicketStoreError::Store)
    }

    async fn remove(&self, key: &str) -> Result<(), Self::Error> {
        debug!(key, "user session removed");

        self.store
            .delete_user_session(key)
            .await
            .map_err(TicketStoreError::Store)
    }
}

fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
