//! Audit logging for token issuance.
//!
//! Every event is emitted via `tracing::info!` with a JSON `audit` field so
//! the trail can be queried by any log aggregator. Token values and key
//! secrets are never part of an event.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `token.issued` | A client token was signed |
//! | `token.denied` | The permission predicate refused (or failed) |
//! | `token.invalid` | The request failed field, action or path validation |
//! | `server_token.renewed` | The server credential cache re-signed |

use serde::Serialize;

use super::action::Action;
use super::claims::{Claims, Credential};

/// Structured audit event.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g. `"token.issued"`).
    pub event: &'static str,
    /// Granted or requested action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Granted or requested resource path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Token subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Expiry of the issued credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Reason for denial or rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// `token.issued`
    #[must_use]
    pub fn issued(claims: &Claims) -> Self {
        Self {
            event: "token.issued",
            action: Some(claims.scope.action),
            path: Some(claims.scope.path.clone()),
            subject: claims.subject.clone(),
            expires_at: Some(claims.expires_at),
            reason: None,
        }
    }

    /// `token.denied`
    #[must_use]
    pub fn denied(action: Action, path: &str, reason: impl Into<String>) -> Self {
        Self {
            event: "token.denied",
            action: Some(action),
            path: Some(path.to_string()),
            subject: None,
            expires_at: None,
            reason: Some(reason.into()),
        }
    }

    /// `token.invalid`
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            event: "token.invalid",
            action: None,
            path: None,
            subject: None,
            expires_at: None,
            reason: Some(reason.into()),
        }
    }

    /// `server_token.renewed`
    #[must_use]
    pub fn server_renewed(credential: &Credential) -> Self {
        Self {
            event: "server_token.renewed",
            action: Some(Action::All),
            path: None,
            subject: None,
            expires_at: Some(credential.expires_at),
            reason: None,
        }
    }
}

/// Emit an audit event.
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "feeds audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
