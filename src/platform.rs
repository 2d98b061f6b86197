//! Outbound feeds API client.
//!
//! Every request carries `Authorization: Bearer <server token>`, taken from
//! the engine's [`ServerCredentialCache`](crate::feeds::ServerCredentialCache),
//! so most calls do not sign anything.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::feeds::AuthorizationEngine;
use crate::feeds::path::validate_feed_id;
use crate::{Error, Result};

const BASE_PATH: &str = "services/feeds/v1";

/// Maximum number of body bytes kept in [`Error::Platform`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct PublishBody<'a> {
    items: &'a [Value],
}

/// Client for the feeds platform API.
#[derive(Debug, Clone)]
pub struct FeedsClient {
    http: reqwest::Client,
    base_url: String,
    engine: Arc<AuthorizationEngine>,
}

impl FeedsClient {
    /// Client for the engine's tenant host (`https://<host>/services/feeds/v1/<app>/feeds`).
    pub fn new(engine: Arc<AuthorizationEngine>) -> Result<Self> {
        let tenant = engine.tenant();
        let host = tenant.host().trim_end_matches('/');
        let origin = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let base_url = format!("{origin}/{BASE_PATH}/{}/feeds", tenant.app_id());
        Self::with_base_url(engine, base_url)
    }

    /// Client against an explicit feeds collection URL.
    pub fn with_base_url(engine: Arc<AuthorizationEngine>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("cannot build platform HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            engine,
        })
    }

    /// Base URL of the feeds collection.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append one item to `feed_id`.
    pub async fn publish(&self, feed_id: &str, item: Value) -> Result<Value> {
        self.publish_batch(feed_id, &[item]).await
    }

    /// Append several items to `feed_id` in one request.
    pub async fn publish_batch(&self, feed_id: &str, items: &[Value]) -> Result<Value> {
        validate_feed_id(feed_id)?;
        let request = self
            .request(Method::POST, &format!("{feed_id}/items"))
            .await?
            .json(&PublishBody { items });
        send(request).await
    }

    /// Delete every item of `feed_id`.
    pub async fn delete(&self, feed_id: &str) -> Result<()> {
        validate_feed_id(feed_id)?;
        let request = self
            .request(Method::DELETE, &format!("{feed_id}/items"))
            .await?;
        send(request).await.map(|_| ())
    }

    /// List feeds, optionally limited and filtered by id prefix.
    pub async fn list(&self, limit: Option<u32>, prefix: Option<&str>) -> Result<Value> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(prefix) = prefix {
            query.push(("prefix", prefix.to_string()));
        }
        let request = self.request(Method::GET, "").await?.query(&query);
        send(request).await
    }

    async fn request(&self, method: Method, suffix: &str) -> Result<RequestBuilder> {
        let token = self.engine.server_token().await?;
        let url = if suffix.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{suffix}", self.base_url)
        };
        debug!(%method, %url, "Platform request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}

async fn send(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    let mut body = response.text().await?;

    if !status.is_success() {
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(Error::Platform {
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::TenantIdentity;

    fn engine(host: Option<&str>) -> Arc<AuthorizationEngine> {
        let tenant =
            TenantIdentity::from_key_pair("app-1", "kid:secret", host.map(str::to_string)).unwrap();
        Arc::new(AuthorizationEngine::builder(tenant).build().unwrap())
    }

    #[test]
    fn base_url_from_host() {
        let client = FeedsClient::new(engine(Some("api.example.com"))).unwrap();
        assert_eq!(
            client.base_url(),
            "https://api.example.com/services/feeds/v1/app-1/feeds"
        );

        let client = FeedsClient::new(engine(Some("http://localhost:8080/"))).unwrap();
        assert_eq!(
            client.base_url(),
            "http://localhost:8080/services/feeds/v1/app-1/feeds"
        );
    }

    #[tokio::test]
    async fn invalid_feed_id_fails_before_any_request() {
        let client =
            FeedsClient::with_base_url(engine(None), "http://127.0.0.1:9/feeds").unwrap();
        let err = client.publish("../other", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
        assert!(client.engine.server_cache().current().is_none());
    }
}
