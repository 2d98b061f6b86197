//! Standalone token endpoint.
//!
//! `POST /feeds/tokens` runs the [`AuthorizationEngine`](crate::feeds::AuthorizationEngine)
//! against the configured [`PolicyPredicate`](crate::feeds::PolicyPredicate).
//! Clients never choose the token subject here.

mod router;
mod serve;

pub use router::{AppState, TokenResponse, create_router};
pub use serve::TokenServer;
