//! Configuration management

use std::{env, path::Path, sync::LazyLock, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::feeds::AddressingMode;
use crate::feeds::cache::DEFAULT_CACHE_TOLERANCE;
use crate::feeds::claims::{DEFAULT_LEEWAY, DEFAULT_LIFETIME};
use crate::feeds::policy::PolicyConfig;
use crate::{Error, Result};

/// `${VAR}` or `${VAR:-default}`
static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("valid env var regex")
});

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Tenant identity
    pub service: ServiceConfig,
    /// Token issuance settings
    pub tokens: TokenConfig,
    /// Signer selection
    pub signer: SignerConfig,
    /// HTTP server
    pub server: ServerConfig,
    /// Permission policy for the standalone token endpoint
    pub policy: PolicyConfig,
}

/// Tenant identity configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Tenant (app/service) id
    #[serde(alias = "app_id", alias = "service_id")]
    pub id: Option<String>,
    /// Combined `keyId:keySecret`
    #[serde(alias = "app_key", alias = "service_key")]
    pub key: Option<String>,
    /// Pre-split key id
    pub key_id: Option<String>,
    /// Pre-split key secret
    pub key_secret: Option<String>,
    /// Platform host / cluster
    #[serde(alias = "cluster")]
    pub host: Option<String>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("id", &self.id)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("key_id", &self.key_id)
            .field("key_secret", &self.key_secret.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .finish()
    }
}

/// Token issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token lifetime
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
    /// Backdating of `iat` to tolerate clock skew
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
    /// How long before expiry the server credential is renewed
    #[serde(with = "humantime_serde")]
    pub cache_tolerance: Duration,
    /// Namespace prefix for `iss` (e.g. `keys/`)
    pub issuer_prefix: Option<String>,
    /// What the permission predicate receives
    pub addressing: AddressingMode,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_LIFETIME,
            leeway: DEFAULT_LEEWAY,
            cache_tolerance: DEFAULT_CACHE_TOLERANCE,
            issuer_prefix: None,
            addressing: AddressingMode::Path,
        }
    }
}

/// Signer mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerMode {
    /// HS256 with the tenant key secret
    #[default]
    Local,
    /// Delegate to a platform signing endpoint
    Remote,
}

/// Signer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Local or remote signing
    pub mode: SignerMode,
    /// Remote signer endpoint
    pub url: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // FEEDS_AUTH_SERVICE__KEY=... etc.
        figment = figment.merge(Env::prefixed("FEEDS_AUTH_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Env files must be loaded before ${VAR} expansion
        config.load_env_files();
        config.expand_env_vars();

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} in identity and signer values
    fn expand_env_vars(&mut self) {
        let service = &mut self.service;
        for value in [
            &mut service.id,
            &mut service.key,
            &mut service.key_id,
            &mut service.key_secret,
            &mut service.host,
            &mut self.signer.url,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_string(value);
        }
    }
}

/// Expand environment variables in a string
fn expand_string(value: &str) -> String {
    ENV_VAR_RE
        .replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "24h", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" must be tried before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            scaled(mins, 60)
        } else if let Some(hours) = s.strip_suffix('h') {
            scaled(hours, 3600)
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }

    fn scaled<E: serde::de::Error>(value: &str, unit: u64) -> Result<Duration, E> {
        let n = value.parse::<u64>().map_err(E::custom)?;
        n.checked_mul(unit)
            .map(Duration::from_secs)
            .ok_or_else(|| E::custom(format!("duration {value} x {unit}s overflows")))
    }
}
