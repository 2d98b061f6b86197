//! Token signing and the wire-format adapter.
//!
//! Internally every component deals in [`Claims`]. The platform verifier
//! expects a JWT payload shaped like
//!
//! ```json
//! {
//!   "app": "<app id>",
//!   "iss": "<key id>",            // optionally namespaced, e.g. "keys/<key id>"
//!   "iat": 1700000000,
//!   "exp": 1700086400,
//!   "sub": "<user id>",           // omitted when absent
//!   "feeds": { "permission": { "action": "READ", "path": "feeds/abc/items" } }
//! }
//! ```
//!
//! [`WireClaims`] is the only place that knows this layout.
//!
//! Two signers are provided:
//!
//! - [`HmacSigner`]: local HS256 with the tenant key secret. Deterministic
//!   for identical claims.
//! - [`RemoteSigner`]: delegates signing to a platform endpoint over HTTP.
//!   Calls are independent of each other; nothing serializes them.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::action::Action;
use super::claims::{Claims, Scope};
use super::tenant::TenantIdentity;
use crate::{Error, Result};

/// Turns claims into an opaque signed token.
#[async_trait]
pub trait TokenSigner: Send + Sync + 'static {
    /// Sign `claims`.
    ///
    /// Failures are configuration-level problems (bad secret, unreachable
    /// signer) and surface as [`Error::Signing`].
    async fn sign(&self, claims: &Claims) -> Result<String>;
}

/// JWT payload as understood by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireClaims {
    /// Tenant (app) id
    pub app: String,
    /// Key id, possibly namespaced
    pub iss: String,
    /// Issued-at
    pub iat: u64,
    /// Expiry
    pub exp: u64,
    /// Subject (user id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Feeds-specific scope
    pub feeds: FeedsClaim,
}

/// `feeds` object of the wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsClaim {
    /// Granted permission
    pub permission: Permission,
}

/// `feeds.permission` object of the wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Granted action
    pub action: Action,
    /// Resource path (or `*`)
    pub path: String,
}

impl WireClaims {
    /// Lay out `claims` for the wire.
    #[must_use]
    pub fn from_claims(claims: &Claims, app_id: &str, issuer_prefix: Option<&str>) -> Self {
        Self {
            app: app_id.to_string(),
            iss: format!("{}{}", issuer_prefix.unwrap_or_default(), claims.issuer),
            iat: claims.issued_at,
            exp: claims.expires_at,
            sub: claims.subject.clone(),
            feeds: FeedsClaim {
                permission: Permission {
                    action: claims.scope.action,
                    path: claims.scope.path.clone(),
                },
            },
        }
    }

    /// Recover canonical claims, stripping the issuer namespace.
    #[must_use]
    pub fn into_claims(self, issuer_prefix: Option<&str>) -> Claims {
        let issuer = match issuer_prefix {
            Some(prefix) => self
                .iss
                .strip_prefix(prefix)
                .map_or_else(|| self.iss.clone(), str::to_string),
            None => self.iss,
        };
        Claims {
            subject: self.sub,
            scope: Scope {
                path: self.feeds.permission.path,
                action: self.feeds.permission.action,
            },
            issuer,
            issued_at: self.iat,
            expires_at: self.exp,
        }
    }
}

/// Local HS256 signer keyed with the tenant secret.
pub struct HmacSigner {
    app_id: String,
    issuer_prefix: Option<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl HmacSigner {
    /// Signer for `tenant`, optionally namespacing `iss` with `issuer_prefix`.
    #[must_use]
    pub fn new(tenant: &TenantIdentity, issuer_prefix: Option<String>) -> Self {
        let secret = tenant.key_secret().as_bytes();
        Self {
            app_id: tenant.app_id().to_string(),
            issuer_prefix,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign synchronously. HS256 never blocks.
    pub fn sign_claims(&self, claims: &Claims) -> Result<String> {
        let wire = WireClaims::from_claims(claims, &self.app_id, self.issuer_prefix.as_deref());
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|e| Error::Signing(e.to_string()))
    }

    /// Decode a token issued by this signer without checking expiry.
    ///
    /// The signature and tenant are still verified.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::InvalidToken(e.to_string()))?;

        if data.claims.app != self.app_id {
            return Err(Error::InvalidToken(format!(
                "token was issued for app {:?}",
                data.claims.app
            )));
        }

        Ok(data.claims.into_claims(self.issuer_prefix.as_deref()))
    }

    /// Decode a token and require it to be unexpired at `now`.
    pub fn verify(&self, token: &str, now: u64) -> Result<Claims> {
        let claims = self.decode(token)?;
        if claims.expires_at <= now {
            return Err(Error::InvalidToken(format!(
                "token expired at {}",
                claims.expires_at
            )));
        }
        Ok(claims)
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("app_id", &self.app_id)
            .field("issuer_prefix", &self.issuer_prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSigner for HmacSigner {
    async fn sign(&self, claims: &Claims) -> Result<String> {
        self.sign_claims(claims)
    }
}

/// Request body sent to a remote signer.
#[derive(Debug, Serialize)]
struct RemoteSignRequest<'a> {
    claims: &'a WireClaims,
}

/// Response body expected from a remote signer.
#[derive(Debug, Deserialize)]
struct RemoteSignResponse {
    token: String,
}

/// Signer that delegates to a platform signing endpoint.
///
/// `POST <url>` with `{"claims": <wire claims>}`, answered by `{"token": "..."}`.
#[derive(Debug, Clone)]
pub struct RemoteSigner {
    http: reqwest::Client,
    url: String,
    app_id: String,
    issuer_prefix: Option<String>,
}

impl RemoteSigner {
    /// Signer posting to `url` on behalf of `tenant`.
    pub fn new(url: impl Into<String>, tenant: &TenantIdentity, issuer_prefix: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("cannot build signer HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            app_id: tenant.app_id().to_string(),
            issuer_prefix,
        })
    }
}

#[async_trait]
impl TokenSigner for RemoteSigner {
    async fn sign(&self, claims: &Claims) -> Result<String> {
        let wire = WireClaims::from_claims(claims, &self.app_id, self.issuer_prefix.as_deref());
        debug!(url = %self.url, path = %wire.feeds.permission.path, "Requesting remote signature");

        let response = self
            .http
            .post(&self.url)
            .json(&RemoteSignRequest { claims: &wire })
            .send()
            .await
            .map_err(|e| Error::Signing(format!("remote signer unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Signing(format!("remote signer returned {status}")));
        }

        let body: RemoteSignResponse = response
            .json()
            .await
            .map_err(|e| Error::Signing(format!("malformed remote signer response: {e}")))?;
        Ok(body.token)
    }
}
