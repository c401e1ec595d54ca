//! Error types for authenticated client operations

use bytes::Bytes;
use serde::Deserialize;

/// Client error type wrapping all possible error conditions
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP transport error: {0}")]
    Transport(
        #[from]
        #[diagnostic_source]
        TransportError,
    ),

    /// Request serialization failed
    #[error("{0}")]
    Encode(
        #[from]
        #[diagnostic_source]
        EncodeError,
    ),

    /// Response deserialization failed
    #[error("{0}")]
    Decode(
        #[from]
        #[diagnostic_source]
        DecodeError,
    ),

    /// HTTP error response
    #[error("{0}")]
    Http(
        #[from]
        #[diagnostic_source]
        HttpError,
    ),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(
        #[from]
        #[diagnostic_source]
        AuthError,
    ),

    /// Request rejected locally before anything was sent
    #[error("Invalid request: {0}")]
    #[diagnostic(code(hireprep::client::validation))]
    Validation(String),
}

/// Transport-level errors that occur during HTTP communication
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// Failed to establish connection to server
    #[error("Connection error: {0}")]
    #[diagnostic(code(hireprep::transport::connect))]
    Connect(String),

    /// Request timed out
    #[error("Request timeout")]
    #[diagnostic(code(hireprep::transport::timeout))]
    Timeout,

    /// Request construction failed (malformed URI, headers, etc.)
    #[error("Invalid request: {0}")]
    #[diagnostic(code(hireprep::transport::invalid_request))]
    InvalidRequest(String),

    /// Other transport error
    #[error("Transport error: {0}")]
    #[diagnostic(code(hireprep::transport::other))]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Request body serialization errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum EncodeError {
    /// JSON serialization failed
    #[error("Failed to serialize JSON: {0}")]
    #[diagnostic(code(hireprep::encode::json))]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),
    /// Form serialization failed
    #[error("Failed to serialize form: {0}")]
    #[diagnostic(code(hireprep::encode::form))]
    Form(
        #[from]
        #[source]
        serde_html_form::ser::Error,
    ),
}

/// Response deserialization errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DecodeError {
    /// JSON deserialization failed
    #[error("Failed to deserialize JSON: {0}")]
    #[diagnostic(code(hireprep::decode::json))]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),
}

/// HTTP error response (any non-2xx status surfaced to the caller)
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[diagnostic(code(hireprep::http))]
pub struct HttpError {
    /// HTTP status code
    pub status: http::StatusCode,
    /// Response body if available
    pub body: Option<Bytes>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl HttpError {
    /// The server's `detail` message, when the body is a `{"detail": ...}` error object.
    pub fn detail(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
        match parsed.detail {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(detail) = self.detail() {
            write!(f, ": {}", detail)?;
        } else if let Some(body) = &self.body {
            if let Ok(s) = std::str::from_utf8(body) {
                if !s.is_empty() {
                    write!(f, ":\n{}", s)?;
                }
            }
        }
        Ok(())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(feature = "reqwest-client")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(Box::new(e))
        }
    }
}

impl From<http::Error> for TransportError {
    fn from(e: http::Error) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

/// Authentication and authorization errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AuthError {
    /// Login rejected the username/password pair
    #[error("Incorrect username or password")]
    #[diagnostic(code(hireprep::auth::invalid_credentials))]
    InvalidCredentials,

    /// The session could not be renewed; the caller must log in again
    #[error("Token refresh failed: {0}")]
    #[diagnostic(
        code(hireprep::auth::refresh_failed),
        help("the session has ended; log in again")
    )]
    RefreshFailed(#[source] RefreshError),
}

/// Outcome of a failed refresh round-trip.
///
/// Cloneable so a single failure can be handed to every caller waiting on the same refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum RefreshError {
    /// Refresh endpoint answered with a non-2xx status
    #[error("refresh rejected with HTTP {status}")]
    #[diagnostic(code(hireprep::refresh::rejected))]
    Rejected {
        /// Status returned by `/auth/refresh`
        status: http::StatusCode,
        /// Server-provided detail, if any
        detail: Option<String>,
    },

    /// Refresh did not settle within the configured timeout
    #[error("refresh timed out")]
    #[diagnostic(code(hireprep::refresh::timeout))]
    Timeout,

    /// Refresh request never reached the server or the reply was lost
    #[error("refresh transport error: {0}")]
    #[diagnostic(code(hireprep::refresh::transport))]
    Transport(String),

    /// Refresh succeeded but the body did not carry an access token
    #[error("malformed refresh response: {0}")]
    #[diagnostic(code(hireprep::refresh::decode))]
    Decode(String),
}

impl From<RefreshError> for ClientError {
    fn from(e: RefreshError) -> Self {
        ClientError::Auth(AuthError::RefreshFailed(e))
    }
}
