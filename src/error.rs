//! Error types for the feeds authorization service

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

use crate::feeds::Action;

/// Result type alias for feeds-auth
pub type Result<T> = std::result::Result<T, Error>;

/// Feeds authorization errors
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be read at all (e.g. a non-JSON body)
    #[error("{0}")]
    BadRequest(String),

    /// A required request field is absent
    #[error("Must provide \"{0}\" in the request body")]
    MissingField(&'static str),

    /// Requested action is not grantable to clients
    #[error("Action must be one of {}", format_actions(accepted))]
    InvalidAction {
        /// The client-grantable actions
        accepted: Vec<Action>,
    },

    /// Resource path does not have the `feeds/<id>/items` shape
    #[error("Path must match regex {0}")]
    InvalidPath(String),

    /// The permission predicate denied the request (or failed)
    #[error("Forbidden")]
    Forbidden,

    /// Configuration error (malformed key pair, missing tenant id, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The underlying signer failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// A presented token failed signature, tenant or expiry checks
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Platform API answered with a non-success status
    #[error("Platform error {status}: {body}")]
    Platform {
        /// HTTP status returned by the platform
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// HTTP status this error maps to at the token endpoint boundary
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::MissingField(_)
            | Self::InvalidAction { .. }
            | Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Platform { .. } | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Signing(_) | Self::Io(_) | Self::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code used in JSON error bodies
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::MissingField(_) => "missing_field",
            Self::InvalidAction { .. } => "invalid_action",
            Self::InvalidPath(_) => "invalid_path",
            Self::Forbidden => "forbidden",
            Self::InvalidToken(_) => "invalid_token",
            Self::Platform { .. } | Self::Http(_) => "upstream_error",
            _ => "internal_error",
        }
    }

    /// Whether the error was caused by the caller's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

fn format_actions(actions: &[Action]) -> String {
    let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
    serde_json::to_string(&names).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_request() {
        assert_eq!(Error::MissingField("action").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::InvalidPath("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(
            Error::InvalidAction {
                accepted: vec![Action::Read]
            }
            .is_client_error()
        );
    }

    #[test]
    fn forbidden_is_403_and_says_nothing_else() {
        assert_eq!(Error::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::Forbidden.to_string(), "Forbidden");
    }

    #[test]
    fn invalid_action_lists_accepted_set() {
        let err = Error::InvalidAction {
            accepted: vec![Action::Read],
        };
        assert_eq!(err.to_string(), r#"Action must be one of ["READ"]"#);
    }

    #[test]
    fn configuration_errors_are_not_client_errors() {
        assert!(!Error::Config("bad key".to_string()).is_client_error());
        assert!(!Error::Signing("boom".to_string()).is_client_error());
    }
}
