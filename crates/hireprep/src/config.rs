//! Client configuration.
//!
//! The API base URL is the only required setting. Everything else has a default that matches
//! the deployed backend (15 minute access tokens, refresh cookie scoped to `/auth`).

use std::time::Duration;

use miette::Diagnostic;
use url::Url;

/// Environment variable holding the API base URL.
pub const ENV_API_URL: &str = "HIREPREP_API_URL";
/// Environment variable overriding the refresh timeout, in seconds.
pub const ENV_REFRESH_TIMEOUT: &str = "HIREPREP_REFRESH_TIMEOUT_SECS";
/// Environment variable overriding the per-request timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "HIREPREP_REQUEST_TIMEOUT_SECS";

/// Upper bound on a single `/auth/refresh` round-trip, including waiters queued behind it.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on any other request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while assembling a [`ClientConfig`].
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("missing required setting {0}")]
    #[diagnostic(
        code(hireprep::config::missing),
        help("set HIREPREP_API_URL to the backend base URL, e.g. http://localhost:8000")
    )]
    Missing(&'static str),

    /// The base URL did not parse
    #[error("invalid API base URL: {0}")]
    #[diagnostic(code(hireprep::config::url))]
    Url(#[from] url::ParseError),

    /// The base URL parsed but cannot serve as an HTTP base
    #[error("API base URL must be http(s): {0}")]
    #[diagnostic(code(hireprep::config::scheme))]
    Scheme(String),

    /// A numeric setting did not parse
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    #[diagnostic(code(hireprep::config::number))]
    Number {
        /// Offending variable
        var: &'static str,
        /// Raw value
        value: String,
    },
}

/// Settings for an [`AuthenticatedClient`](crate::client::AuthenticatedClient).
#[derive(Debug, Clone, bon::Builder)]
#[builder(start_fn = new)]
pub struct ClientConfig {
    /// API base, e.g. `https://api.hireprep.dev`. Endpoint paths are appended to it.
    pub base_url: Url,
    /// Bound on a refresh round-trip.
    #[builder(default = DEFAULT_REFRESH_TIMEOUT)]
    pub refresh_timeout: Duration,
    /// Bound on any other request (applied by the default transport).
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Config with defaults for everything but the base URL.
    pub fn with_base(base: &str) -> Result<Self, ConfigError> {
        Ok(Self::new().base_url(parse_base(base)?).build())
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_API_URL))?;
        let refresh_timeout = seconds(&lookup, ENV_REFRESH_TIMEOUT)?;
        let request_timeout = seconds(&lookup, ENV_REQUEST_TIMEOUT)?;

        Ok(Self::new()
            .base_url(parse_base(base.trim())?)
            .maybe_refresh_timeout(refresh_timeout)
            .maybe_request_timeout(request_timeout)
            .build())
    }

    /// Absolute URI for an API path, keeping any path prefix on the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_base(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::Scheme(raw.to_string()));
    }
    Ok(url)
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|s| Some(Duration::from_secs(s)))
            .map_err(|_| ConfigError::Number { var, value: raw }),
    }
}
