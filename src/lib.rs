//! Feeds Auth Library
//!
//! Issues and validates scoped, time-bounded access tokens for feeds: append-only,
//! per-topic item logs addressed as `feeds/<id>/items`.
//!
//! # Features
//!
//! - **Authorization engine**: validates `{action, path}` requests, consults a
//!   caller-supplied (sync or async) permission predicate and signs a token
//!   carrying exactly the granted scope
//! - **Server credential cache**: lazily renewed, maximal-scope token for this
//!   service's own platform calls
//! - **Signers**: local HS256 or platform-delegated signing
//! - **Token endpoint**: `POST /feeds/tokens` backed by a glob policy
//! - **Platform client**: publish, batch publish, delete and list feeds

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod feeds;
pub mod platform;
pub mod server;

pub use error::{Error, Result};
pub use feeds::{
    Action, AuthorizationEngine, AuthorizationRequest, Credential, PermissionPredicate,
    sync_predicate,
};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
