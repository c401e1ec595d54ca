use http::HeaderValue;
use http::header::InvalidHeaderValue;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Opaque short-lived bearer credential issued by `/auth/login` and `/auth/refresh`.
///
/// The value is never printed by `Debug`, so tokens can sit inside structs that get logged.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(SmolStr);

impl AccessToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<SmolStr>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for this token (`Bearer <token>`).
    pub fn bearer(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::try_from(self)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"<redacted>").finish()
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl TryFrom<&AccessToken> for HeaderValue {
    type Error = InvalidHeaderValue;

    fn try_from(token: &AccessToken) -> Result<Self, Self::Error> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}
