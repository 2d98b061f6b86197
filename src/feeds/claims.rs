//! Canonical claims and their construction.
//!
//! [`Claims`] is the single internal shape of "who may do what, until when".
//! How it is laid out on the wire is the signer's concern (see
//! [`super::signer::WireClaims`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::action::Action;

/// Resource path carried by the server credential.
pub const WILDCARD_PATH: &str = "*";

/// Default backdating applied to `iat`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(30);

/// Default token lifetime.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// The granted scope: one action on one resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// `feeds/<id>/items`, or `*` for the server credential
    pub path: String,
    /// Granted action
    pub action: Action,
}

/// Claims embedded in a signed credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// End user the token was issued for, if any
    pub subject: Option<String>,
    /// Granted scope
    pub scope: Scope,
    /// Signing key id
    pub issuer: String,
    /// Issued-at (epoch seconds, already backdated by the leeway)
    pub issued_at: u64,
    /// Expiry (epoch seconds)
    pub expires_at: u64,
}

/// A signed token together with its validity window.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque signed token
    pub token: String,
    /// Issued-at (epoch seconds)
    pub issued_at: u64,
    /// Expiry (epoch seconds)
    pub expires_at: u64,
}

impl Credential {
    /// Seconds of validity left at `now` (zero once expired).
    #[must_use]
    pub fn expires_in(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Builds [`Claims`] with a fixed leeway and lifetime.
#[derive(Debug, Clone, Copy)]
pub struct ClaimsBuilder {
    leeway: Duration,
    lifetime: Duration,
}

impl Default for ClaimsBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LEEWAY, DEFAULT_LIFETIME)
    }
}

impl ClaimsBuilder {
    /// Builder with explicit leeway and lifetime.
    #[must_use]
    pub fn new(leeway: Duration, lifetime: Duration) -> Self {
        Self { leeway, lifetime }
    }

    /// Configured lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Build claims for `action` on `path`.
    ///
    /// `issued_at = now - leeway`, `expires_at = issued_at + lifetime`.
    #[must_use]
    pub fn build(
        &self,
        action: Action,
        path: &str,
        subject: Option<&str>,
        issuer: &str,
        now: u64,
    ) -> Claims {
        let issued_at = now.saturating_sub(self.leeway.as_secs());
        Claims {
            subject: subject.map(str::to_string),
            scope: Scope {
                path: path.to_string(),
                action,
            },
            issuer: issuer.to_string(),
            issued_at,
            expires_at: issued_at.saturating_add(self.lifetime.as_secs()),
        }
    }

    /// Maximal-scope claims for the self-issued server credential.
    #[must_use]
    pub fn server(&self, issuer: &str, now: u64) -> Claims {
        self.build(Action::All, WILDCARD_PATH, None, issuer, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn build_backdates_and_expires_after_lifetime() {
        let claims = ClaimsBuilder::default().build(
            Action::Read,
            "feeds/a/items",
            Some("will"),
            "key-id",
            NOW,
        );
        assert_eq!(claims.issued_at, NOW - 30);
        assert_eq!(claims.expires_at, NOW - 30 + 86_400);
        assert_eq!(claims.subject.as_deref(), Some("will"));
        assert_eq!(claims.issuer, "key-id");
        assert_eq!(
            claims.scope,
            Scope {
                path: "feeds/a/items".to_string(),
                action: Action::Read
            }
        );
    }

    #[test]
    fn server_claims_are_maximal_and_anonymous() {
        let claims = ClaimsBuilder::default().server("key-id", NOW);
        assert_eq!(claims.scope.action, Action::All);
        assert_eq!(claims.scope.path, WILDCARD_PATH);
        assert!(claims.subject.is_none());
    }

    #[test]
    fn custom_leeway_and_lifetime() {
        let builder = ClaimsBuilder::new(Duration::ZERO, Duration::from_secs(60));
        let claims = builder.server("k", NOW);
        assert_eq!(claims.issued_at, NOW);
        assert_eq!(claims.expires_at, NOW + 60);
    }

    #[test]
    fn credential_debug_hides_token() {
        let cred = Credential {
            token: "secret.jwt.value".to_string(),
            issued_at: 1,
            expires_at: 2,
        };
        assert!(!format!("{cred:?}").contains("secret.jwt.value"));
        assert_eq!(cred.expires_in(1), 1);
        assert_eq!(cred.expires_in(10), 0);
    }

    #[test]
    fn huge_lifetime_saturates_instead_of_wrapping() {
        let builder = ClaimsBuilder::new(Duration::ZERO, Duration::from_secs(u64::MAX));
        let claims = builder.build(Action::Read, "feeds/a/items", None, "k", NOW);
        assert_eq!(claims.expires_at, u64::MAX);
    }
}
