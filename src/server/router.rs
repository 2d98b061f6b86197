//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::Uri,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::Error;
use crate::feeds::{AuthorizationEngine, AuthorizationRequest, PermissionPredicate, TokenRequestBody};

/// Shared application state
pub struct AppState {
    /// Token issuance engine
    pub engine: Arc<AuthorizationEngine>,
    /// Predicate consulted for every client request
    pub policy: Arc<dyn PermissionPredicate>,
}

/// Successful token response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed token
    pub token: String,
    /// Expiry, seconds since the epoch
    pub expires_at: u64,
    /// Seconds until expiry
    pub expires_in: u64,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/feeds/tokens", post(token_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Issue a client token.
///
/// The JSON body wins when present; otherwise the query string is used, so
/// `POST /feeds/tokens?action=READ&path=feeds/a/items` works too.
async fn token_handler(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Bytes,
) -> Result<Json<TokenResponse>, Error> {
    let form = if body.iter().all(u8::is_ascii_whitespace) {
        let Query(query) = Query::<TokenRequestBody>::try_from_uri(&uri).map_err(|e| {
            debug!(error = %e, "Unparseable token request query");
            Error::BadRequest(e.body_text())
        })?;
        query
    } else {
        serde_json::from_slice::<TokenRequestBody>(&body).map_err(|e| {
            debug!(error = %e, "Unparseable token request body");
            Error::BadRequest(format!("Request body must be a JSON object: {e}"))
        })?
    };

    let request = AuthorizationRequest::from(form);
    let credential = state.engine.authorize(&request, state.policy.as_ref()).await?;
    let expires_in = credential.expires_in(state.engine.now());

    Ok(Json(TokenResponse {
        token: credential.token,
        expires_at: credential.expires_at,
        expires_in,
    }))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Token request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": self.code(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
