//! Client error types

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Body returned by the server alongside a non-2xx status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPayload {
    /// Raw response text
    pub raw: String,
    /// Parsed JSON, when the body was JSON
    pub json: Option<serde_json::Value>,
}

impl ErrorPayload {
    /// Build a payload from a response body
    pub fn from_body(body: &[u8]) -> Self {
        Self {
            raw: String::from_utf8_lossy(body).into_owned(),
            json: serde_json::from_slice(body).ok(),
        }
    }

    /// The `detail` or `message` field of a JSON error body, if any
    pub fn detail(&self) -> Option<&str> {
        let json = self.json.as_ref()?;
        json.get("detail")
            .or_else(|| json.get("message"))
            .and_then(|value| value.as_str())
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => f.write_str(detail),
            None => f.write_str(&self.raw),
        }
    }
}

/// Client error types
///
/// Cloneable so that the outcome of one refresh can be handed to every
/// request that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Network or request error; the server never answered
    #[error("Request failed: {0}")]
    Request(Arc<reqwest::Error>),

    /// Authentication failed (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(ErrorPayload),

    /// Forbidden (403)
    #[error("Forbidden: {0}")]
    Forbidden(ErrorPayload),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(ErrorPayload),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(ErrorPayload),

    /// Server returned any other error status
    #[error("Server error {status}: {payload}")]
    ServerError { status: u16, payload: ErrorPayload },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// Session refresh did not settle in time
    #[error("Session refresh timed out after {0:?}")]
    RefreshTimedOut(Duration),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, payload: ErrorPayload) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(payload),
            401 => Self::AuthenticationFailed(payload),
            403 => Self::Forbidden(payload),
            404 => Self::NotFound(payload),
            _ => Self::ServerError {
                status: status.as_u16(),
                payload,
            },
        }
    }

    /// HTTP status, when the server responded
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::ServerError { status, .. } => Some(*status),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-provided error body, when the server responded
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            Self::BadRequest(payload)
            | Self::AuthenticationFailed(payload)
            | Self::Forbidden(payload)
            | Self::NotFound(payload)
            | Self::ServerError { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// 401
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// 401 or 403
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::Forbidden(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(Arc::new(err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
