//! Security plumbing for backend-for-frontend hosts, where the browser is
//! authenticated by a cookie and never sees a token.
//!
//! - [`BffLayer`] requires a static anti-forgery header on protected API
//!   routes and turns authentication challenge redirects from those routes
//!   into `401 Unauthorized`.
//! - [`session::ServerSideTicketStore`] keeps the authentication ticket on the
//!   server, the cookie carries only a random key.
//!
//! Register the filter once in front of routing and tag protected routes.
//! A tagged route reached without the filter in front of it answers 500.
//!
//! ```
//! use axum::{routing::{get, post}, Router};
//! use tower_bff::{BffLayer, Endpoint};
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "index" }))
//!     .route(
//!         "/api/todos",
//!         post(|| async { "created" }).layer(Endpoint::protected_api()),
//!     )
//!     .layer(BffLayer::default());
//! ```

mod antiforgery;
mod endpoint;
mod middleware;
pub mod session;

pub use antiforgery::{
    AntiForgeryOptions, ConfigError, ProtectionError, DEFAULT_HEADER_NAME, DEFAULT_HEADER_VALUE,
};
pub use endpoint::{Classified, Endpoint, EndpointResolver, FilterMarker, FromExtensions, Tag};
pub use middleware::{BffLayer, BffMiddleware};
