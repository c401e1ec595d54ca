//! Minimal HTTP client abstraction shared across crates.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "reqwest-client")]
use crate::error::TransportError;

/// HTTP client trait for sending raw HTTP requests.
///
/// The transport is responsible for cookies: the refresh credential lives in an HTTP-only
/// cookie that must be stored from `/auth/login` responses and replayed on `/auth/refresh`.
#[trait_variant::make(Send)]
pub trait HttpClient {
    /// Error type returned by the HTTP client
    type Error: std::error::Error + Display + Send + Sync + 'static;

    /// Send an HTTP request and return the response.
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>>;
}

#[cfg(feature = "reqwest-client")]
impl HttpClient for reqwest::Client {
    type Error = TransportError;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        // Convert http::Request to reqwest::Request
        let (parts, body) = request.into_parts();

        let mut req = self.request(parts.method, parts.uri.to_string()).body(body);

        // Copy headers
        for (name, value) in parts.headers.iter() {
            req = req.header(name, value);
        }

        let resp = req.send().await?;
        #[cfg(feature = "tracing")]
        tracing::trace!(status = %resp.status(), url = %resp.url(), "response received");

        // Convert reqwest::Response to http::Response
        let mut builder = http::Response::builder()
            .status(resp.status())
            .version(resp.version());

        for (name, value) in resp.headers().iter() {
            builder = builder.header(name, value);
        }

        let body = resp.bytes().await?.to_vec();

        Ok(builder.body(body)?)
    }
}

/// Build the default transport: a `reqwest` client with its cookie store enabled so the
/// refresh cookie issued at login is sent back on `/auth/refresh` and `/auth/logout`.
#[cfg(feature = "reqwest-client")]
pub fn cookie_transport(
    request_timeout: std::time::Duration,
) -> core::result::Result<reqwest::Client, TransportError> {
    Ok(reqwest::Client::builder()
        .cookie_store(true)
        .timeout(request_timeout)
        .build()?)
}

impl<T: HttpClient + Sync> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>> + Send
    {
        self.as_ref().send_http(request)
    }
}
