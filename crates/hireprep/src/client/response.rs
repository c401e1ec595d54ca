use bytes::Bytes;
use hireprep_common::error::{ClientError, DecodeError, HttpError, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// API response wrapper that owns the response buffer.
///
/// Every status the server produced ends up here; use [`ApiResponse::json`] or
/// [`ApiResponse::into_result`] to turn non-2xx statuses into [`HttpError`]s.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    buffer: Bytes,
}

impl ApiResponse {
    /// Create a new response from a buffer and status code
    pub fn new(buffer: Bytes, status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            buffer,
        }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the raw buffer
    pub fn body(&self) -> &Bytes {
        &self.buffer
    }

    /// Error for a non-2xx status, `None` on success.
    pub fn error(&self) -> Option<HttpError> {
        (!self.status.is_success()).then(|| HttpError {
            status: self.status,
            body: Some(self.buffer.clone()),
        })
    }

    /// Keep the response if it is 2xx, otherwise surface it as [`ClientError::Http`].
    pub fn into_result(self) -> Result<Self> {
        match self.error() {
            Some(err) => Err(err.into()),
            None => Ok(self),
        }
    }

    /// Decode a 2xx JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if let Some(err) = self.error() {
            return Err(err.into());
        }
        serde_json::from_slice(&self.buffer)
            .map_err(|e| ClientError::Decode(DecodeError::Json(e)))
    }
}

impl From<http::Response<Vec<u8>>> for ApiResponse {
    fn from(response: http::Response<Vec<u8>>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            buffer: Bytes::from(body),
        }
    }
}
