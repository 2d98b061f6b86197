//! Server credential cache.
//!
//! Holds the self-issued, maximal-scope credential used for this service's
//! own calls to the platform. The slot is either empty or holds one
//! [`Credential`]; renewal is lazy and happens inside [`ServerCredentialCache::get_token`].
//!
//! The slot is only ever replaced wholesale. Two callers that both observe
//! an expired credential will both sign a fresh one and the last write wins;
//! both tokens are valid, so the race is harmless and not reported.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use super::audit::{self, AuditEvent};
use super::claims::{ClaimsBuilder, Credential};
use super::signer::TokenSigner;
use crate::Result;

/// Default renewal margin before the real expiry.
pub const DEFAULT_CACHE_TOLERANCE: Duration = Duration::from_secs(60);

/// Lazily-populated single-slot cache for the server credential.
pub struct ServerCredentialCache {
    slot: RwLock<Option<Credential>>,
    builder: ClaimsBuilder,
    signer: Arc<dyn TokenSigner>,
    issuer: String,
    tolerance: u64,
}

impl ServerCredentialCache {
    /// Empty cache signing with `signer` as `issuer`.
    ///
    /// The cached credential is treated as expired `tolerance` before its
    /// `expires_at`.
    #[must_use]
    pub fn new(
        builder: ClaimsBuilder,
        signer: Arc<dyn TokenSigner>,
        issuer: impl Into<String>,
        tolerance: Duration,
    ) -> Self {
        Self {
            slot: RwLock::new(None),
            builder,
            signer,
            issuer: issuer.into(),
            tolerance: tolerance.as_secs(),
        }
    }

    /// Return the cached server token, re-signing if it is missing or expired at `now`.
    pub async fn get_token(&self, now: u64) -> Result<String> {
        if let Some(token) = self.fresh_token(now) {
            return Ok(token);
        }

        let claims = self.builder.server(&self.issuer, now);
        let token = self.signer.sign(&claims).await?;
        let credential = Credential {
            token: token.clone(),
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        };

        debug!(expires_at = credential.expires_at, "Server credential renewed");
        audit::emit(&AuditEvent::server_renewed(&credential));
        *self.slot.write() = Some(credential);

        Ok(token)
    }

    /// Snapshot of the cached credential, if any.
    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.slot.read().clone()
    }

    /// Drop the cached credential; the next call re-signs.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    fn fresh_token(&self, now: u64) -> Option<String> {
        let guard = self.slot.read();
        let credential = guard.as_ref()?;
        (credential.expires_at.saturating_sub(self.tolerance) > now)
            .then(|| credential.token.clone())
    }
}

impl std::fmt::Debug for ServerCredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCredentialCache")
            .field("cached", &self.slot.read().is_some())
            .field("issuer", &self.issuer)
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}
