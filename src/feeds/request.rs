//! Inbound authorization requests.
//!
//! The canonical form is `{"action": "READ", "path": "feeds/<id>/items"}`.
//! The older `{"feed_id": "<id>", "type": "READ"}` form is still accepted
//! and translated here, before anything reaches the engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A request for a client token. Fields are unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Requested action (wire name)
    pub action: Option<String>,
    /// Requested resource path
    pub path: Option<String>,
    /// Subject to embed as `sub`, set by the embedding application
    pub subject: Option<String>,
}

impl AuthorizationRequest {
    /// Request for `action` on `path`.
    pub fn new(action: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            path: Some(path.into()),
            subject: None,
        }
    }

    /// Attach the token subject (typically the logged-in user id).
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Token request body as sent by clients, in either supported form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequestBody {
    /// Canonical action
    #[serde(default)]
    pub action: Option<String>,
    /// Canonical path
    #[serde(default)]
    pub path: Option<String>,
    /// Legacy feed id
    #[serde(default)]
    pub feed_id: Option<String>,
    /// Legacy action
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl TokenRequestBody {
    /// Whether no recognised field was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action.is_none() && self.path.is_none() && self.feed_id.is_none() && self.kind.is_none()
    }
}

impl From<TokenRequestBody> for AuthorizationRequest {
    fn from(body: TokenRequestBody) -> Self {
        let legacy = (body.path.is_none() && body.feed_id.is_some())
            || (body.action.is_none() && body.kind.is_some());
        if legacy {
            debug!("Translating legacy feed_id/type token request");
        }

        Self {
            action: body.action.or(body.kind),
            path: body
                .path
                .or_else(|| body.feed_id.map(|id| format!("feeds/{id}/items"))),
            subject: None,
        }
    }
}
