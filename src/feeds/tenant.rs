//! Tenant identity: app id, signing key pair and platform host.

use std::fmt;

use crate::config::ServiceConfig;
use crate::{Error, Result};

/// Platform host used when none is configured.
pub const DEFAULT_HOST: &str = "api-ceres.kube.pusherplatform.io";

/// Identity of the tenant this service signs for.
///
/// Built once at engine construction. The key secret is only reachable
/// through [`TenantIdentity::key_secret`] and never appears in `Debug`
/// output, claims or responses.
#[derive(Clone)]
pub struct TenantIdentity {
    app_id: String,
    key_id: String,
    key_secret: String,
    host: String,
}

impl TenantIdentity {
    /// Identity from pre-split key fields.
    pub fn new(
        app_id: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        host: Option<String>,
    ) -> Result<Self> {
        let app_id = app_id.into();
        let key_id = key_id.into();
        let key_secret = key_secret.into();

        if app_id.is_empty() {
            return Err(Error::Config("service id must not be empty".to_string()));
        }
        if key_id.is_empty() || key_secret.is_empty() {
            return Err(Error::Config(
                "service key must have a non-empty key id and secret".to_string(),
            ));
        }

        Ok(Self {
            app_id,
            key_id,
            key_secret,
            host: host
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        })
    }

    /// Identity from a colon-delimited `keyId:keySecret` pair.
    ///
    /// The split happens at the first colon; the secret may itself contain
    /// colons.
    pub fn from_key_pair(
        app_id: impl Into<String>,
        key: &str,
        host: Option<String>,
    ) -> Result<Self> {
        let (key_id, key_secret) = key.split_once(':').ok_or_else(|| {
            Error::Config("service key must have the form \"<key id>:<key secret>\"".to_string())
        })?;
        Self::new(app_id, key_id, key_secret, host)
    }

    /// Identity from the `service` configuration section.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let app_id = config
            .id
            .clone()
            .ok_or_else(|| Error::Config("service.id is required".to_string()))?;

        match (&config.key, &config.key_id, &config.key_secret) {
            (Some(key), None, None) => Self::from_key_pair(app_id, key, config.host.clone()),
            (None, Some(id), Some(secret)) => {
                Self::new(app_id, id.clone(), secret.clone(), config.host.clone())
            }
            (None, None, None) => Err(Error::Config(
                "service.key (or service.key_id + service.key_secret) is required".to_string(),
            )),
            _ => Err(Error::Config(
                "set either service.key or service.key_id + service.key_secret, not both"
                    .to_string(),
            )),
        }
    }

    /// Tenant (app) id.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Signing key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signing key secret.
    #[must_use]
    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    /// Platform host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Debug for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantIdentity")
            .field("app_id", &self.app_id)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("host", &self.host)
            .finish()
    }
}
