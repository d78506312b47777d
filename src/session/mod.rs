//! Server-side sessions: the authentication ticket stays on the server and the
//! client only holds an opaque, random key.

mod memory;
mod store;
mod ticket;
mod ticket_store;

pub use memory::{InMemoryUserSessionStore, MemoryStoreError};
pub use store::{UserSession, UserSessionStore, UserSessionsFilter};
pub use ticket::{AuthenticationTicket, Claim, TicketError, SESSION_ID_CLAIM, SUBJECT_CLAIM};
pub use ticket_store::{ServerSideTicketStore, TicketStore, TicketStoreError};
