//! Authorization engine: turns an inbound request into a signed client token.
//!
//! # Pipeline
//!
//! ```text
//! AuthorizationRequest
//!   -> field presence  (MissingField)
//!   -> action          (InvalidAction, client-grantable set only)
//!   -> path            (InvalidPath, anchored feeds/<id>/items)
//!   -> predicate       (Forbidden; false and Err are indistinguishable)
//!   -> ClaimsBuilder + TokenSigner
//!   -> Credential
//! ```
//!
//! The cheap local checks always run first, so the caller's predicate is
//! only ever invoked with a validated action and path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::action::{Action, validate_client_action};
use super::audit::{self, AuditEvent};
use super::cache::{DEFAULT_CACHE_TOLERANCE, ServerCredentialCache};
use super::claims::{ClaimsBuilder, Credential, DEFAULT_LEEWAY, DEFAULT_LIFETIME};
use super::clock::{Clock, SystemClock};
use super::path::FeedPath;
use super::request::AuthorizationRequest;
use super::signer::{HmacSigner, RemoteSigner, TokenSigner};
use super::tenant::TenantIdentity;
use crate::config::{Config, SignerMode};
use crate::{Error, Result};

/// Caller-supplied decision: may `action` be granted on `resource`?
///
/// `resource` is either the full path or the bare feed id, depending on the
/// [`AddressingMode`]. Returning `Ok(false)` or any `Err` denies the request.
#[async_trait]
pub trait PermissionPredicate: Send + Sync {
    /// Decide whether to grant.
    async fn has_permission(&self, action: Action, resource: &str) -> anyhow::Result<bool>;
}

#[async_trait]
impl<F, Fut> PermissionPredicate for F
where
    F: Fn(Action, String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn has_permission(&self, action: Action, resource: &str) -> anyhow::Result<bool> {
        (self)(action, resource.to_string()).await
    }
}

/// Adapter lifting a synchronous `Fn(Action, &str) -> bool` into a predicate.
#[derive(Debug, Clone, Copy)]
pub struct SyncPredicate<F>(pub F);

#[async_trait]
impl<F> PermissionPredicate for SyncPredicate<F>
where
    F: Fn(Action, &str) -> bool + Send + Sync,
{
    async fn has_permission(&self, action: Action, resource: &str) -> anyhow::Result<bool> {
        Ok((self.0)(action, resource))
    }
}

/// Wrap a synchronous closure as a [`PermissionPredicate`].
pub fn sync_predicate<F>(f: F) -> SyncPredicate<F>
where
    F: Fn(Action, &str) -> bool + Send + Sync,
{
    SyncPredicate(f)
}

/// What the permission predicate is given as the resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    /// The full `feeds/<id>/items` path
    #[default]
    Path,
    /// Only the extracted feed id
    FeedId,
}

/// Orchestrates validation, the permission predicate and signing.
pub struct AuthorizationEngine {
    tenant: TenantIdentity,
    builder: ClaimsBuilder,
    signer: Arc<dyn TokenSigner>,
    cache: ServerCredentialCache,
    clock: Arc<dyn Clock>,
    addressing: AddressingMode,
}

impl AuthorizationEngine {
    /// Start building an engine for `tenant`.
    #[must_use]
    pub fn builder(tenant: TenantIdentity) -> EngineBuilder {
        EngineBuilder::new(tenant)
    }

    /// Build an engine from configuration.
    ///
    /// Fails with [`Error::Config`] on a malformed tenant identity or signer setup.
    pub fn from_config(config: &Config) -> Result<Self> {
        let tenant = TenantIdentity::from_config(&config.service)?;
        let tokens = &config.tokens;

        let mut builder = Self::builder(tenant.clone())
            .leeway(tokens.leeway)
            .lifetime(tokens.lifetime)
            .cache_tolerance(tokens.cache_tolerance)
            .addressing(tokens.addressing);
        if let Some(ref prefix) = tokens.issuer_prefix {
            builder = builder.issuer_prefix(prefix.clone());
        }

        if config.signer.mode == SignerMode::Remote {
            let url = config.signer.url.clone().ok_or_else(|| {
                Error::Config("signer.url is required when signer.mode is remote".to_string())
            })?;
            let signer = RemoteSigner::new(url, &tenant, tokens.issuer_prefix.clone())?;
            builder = builder.signer(Arc::new(signer));
        }

        builder.build()
    }

    /// Tenant this engine signs for.
    #[must_use]
    pub fn tenant(&self) -> &TenantIdentity {
        &self.tenant
    }

    /// Default addressing mode.
    #[must_use]
    pub fn addressing(&self) -> AddressingMode {
        self.addressing
    }

    /// Authorize using the engine's configured addressing mode.
    pub async fn authorize<P>(
        &self,
        request: &AuthorizationRequest,
        predicate: &P,
    ) -> Result<Credential>
    where
        P: PermissionPredicate + ?Sized,
    {
        self.authorize_with(request, predicate, self.addressing).await
    }

    /// Authorize, handing the predicate the bare feed id.
    pub async fn authorize_feed<P>(
        &self,
        request: &AuthorizationRequest,
        predicate: &P,
    ) -> Result<Credential>
    where
        P: PermissionPredicate + ?Sized,
    {
        self.authorize_with(request, predicate, AddressingMode::FeedId)
            .await
    }

    /// Authorize, handing the predicate the full path.
    pub async fn authorize_path<P>(
        &self,
        request: &AuthorizationRequest,
        predicate: &P,
    ) -> Result<Credential>
    where
        P: PermissionPredicate + ?Sized,
    {
        self.authorize_with(request, predicate, AddressingMode::Path)
            .await
    }

    /// Validate `request`, consult `predicate` and sign a client credential.
    pub async fn authorize_with<P>(
        &self,
        request: &AuthorizationRequest,
        predicate: &P,
        addressing: AddressingMode,
    ) -> Result<Credential>
    where
        P: PermissionPredicate + ?Sized,
    {
        let (action, path) = validate(request).inspect_err(|e| {
            audit::emit(&AuditEvent::invalid(e.to_string()));
        })?;

        let resource = match addressing {
            AddressingMode::Path => path.as_str(),
            AddressingMode::FeedId => path.feed_id(),
        };

        match predicate.has_permission(action, resource).await {
            Ok(true) => {}
            Ok(false) => {
                audit::emit(&AuditEvent::denied(action, path.as_str(), "permission denied"));
                return Err(Error::Forbidden);
            }
            Err(e) => {
                debug!(error = %e, path = %path, "Permission predicate failed");
                audit::emit(&AuditEvent::denied(action, path.as_str(), "permission check failed"));
                return Err(Error::Forbidden);
            }
        }

        let claims = self.builder.build(
            action,
            path.as_str(),
            request.subject.as_deref(),
            self.tenant.key_id(),
            self.clock.now(),
        );
        let token = self.signer.sign(&claims).await?;

        audit::emit(&AuditEvent::issued(&claims));
        info!(path = %path, action = %action, expires_at = claims.expires_at, "Issued feed token");

        Ok(Credential {
            token,
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        })
    }

    /// Bearer token for this service's own platform calls.
    pub async fn server_token(&self) -> Result<String> {
        self.cache.get_token(self.clock.now()).await
    }

    /// The server credential cache.
    #[must_use]
    pub fn server_cache(&self) -> &ServerCredentialCache {
        &self.cache
    }

    /// Current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }
}

impl std::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("tenant", &self.tenant)
            .field("addressing", &self.addressing)
            .finish_non_exhaustive()
    }
}

/// Field presence, then action, then path.
fn validate(request: &AuthorizationRequest) -> Result<(Action, FeedPath)> {
    let raw_action = request.action.as_deref().ok_or(Error::MissingField("action"))?;
    let raw_path = request.path.as_deref().ok_or(Error::MissingField("path"))?;

    let action = validate_client_action(raw_action)?;
    let path = FeedPath::parse(raw_path)?;
    Ok((action, path))
}

/// Builder for [`AuthorizationEngine`].
pub struct EngineBuilder {
    tenant: TenantIdentity,
    leeway: Duration,
    lifetime: Duration,
    cache_tolerance: Duration,
    issuer_prefix: Option<String>,
    signer: Option<Arc<dyn TokenSigner>>,
    clock: Arc<dyn Clock>,
    addressing: AddressingMode,
}

impl EngineBuilder {
    fn new(tenant: TenantIdentity) -> Self {
        Self {
            tenant,
            leeway: DEFAULT_LEEWAY,
            lifetime: DEFAULT_LIFETIME,
            cache_tolerance: DEFAULT_CACHE_TOLERANCE,
            issuer_prefix: None,
            signer: None,
            clock: Arc::new(SystemClock),
            addressing: AddressingMode::default(),
        }
    }

    /// Backdating applied to `iat`.
    #[must_use]
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Token lifetime.
    #[must_use]
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Renewal margin of the server credential cache.
    #[must_use]
    pub fn cache_tolerance(mut self, tolerance: Duration) -> Self {
        self.cache_tolerance = tolerance;
        self
    }

    /// Namespace prefix for `iss` (e.g. `keys/`). Ignored with a custom signer.
    #[must_use]
    pub fn issuer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.issuer_prefix = Some(prefix.into());
        self
    }

    /// Replace the default HS256 signer.
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default addressing mode for [`AuthorizationEngine::authorize`].
    #[must_use]
    pub fn addressing(mut self, addressing: AddressingMode) -> Self {
        self.addressing = addressing;
        self
    }

    /// Finish construction.
    ///
    /// Fails with [`Error::Config`] unless the lifetime outlasts the leeway
    /// plus the cache tolerance; otherwise client tokens would be issued
    /// already expired and the server credential would never be reused.
    pub fn build(self) -> Result<AuthorizationEngine> {
        validate_windows(self.leeway, self.lifetime, self.cache_tolerance)?;

        let builder = ClaimsBuilder::new(self.leeway, self.lifetime);
        let signer = self.signer.unwrap_or_else(|| {
            Arc::new(HmacSigner::new(&self.tenant, self.issuer_prefix.clone()))
        });
        let cache = ServerCredentialCache::new(
            builder,
            signer.clone(),
            self.tenant.key_id(),
            self.cache_tolerance,
        );

        Ok(AuthorizationEngine {
            tenant: self.tenant,
            builder,
            signer,
            cache,
            clock: self.clock,
            addressing: self.addressing,
        })
    }
}

fn validate_windows(leeway: Duration, lifetime: Duration, tolerance: Duration) -> Result<()> {
    let floor = leeway
        .as_secs()
        .checked_add(tolerance.as_secs())
        .ok_or_else(|| Error::Config("tokens.leeway + tokens.cache_tolerance overflows".to_string()))?;
    let lifetime = lifetime.as_secs();

    if lifetime <= floor {
        return Err(Error::Config(format!(
            "tokens.lifetime ({lifetime}s) must exceed tokens.leeway + tokens.cache_tolerance ({floor}s)"
        )));
    }
    if i64::try_from(lifetime).is_err() {
        return Err(Error::Config(format!("tokens.lifetime ({lifetime}s) is too large")));
    }
    Ok(())
}
