//! Authenticated HTTP client for the HirePrep API
//!
//! [`AuthenticatedClient`] attaches the current access token to every request, and when a
//! request comes back `401 Unauthorized` it renews the session through `/auth/refresh` (the
//! refresh credential rides along as an HTTP-only cookie) and resends the request once.
//! Concurrent 401s share a single refresh via [`RefreshCoordinator`].

pub mod auth;
pub mod refresh;
mod response;

use std::sync::Arc;

pub use auth::{LoginOutcome, Registration, User};
use hireprep_common::{
    AccessToken, CredentialStore, MemoryCredentialStore,
    error::{ClientError, EncodeError, Result, TransportError},
    http_client::{HttpClient, cookie_transport},
};
use http::{
    HeaderMap, Method, StatusCode, Uri, Version,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
pub use refresh::RefreshCoordinator;
pub use response::ApiResponse;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::redirect::{LogRedirect, LoginRedirect};

pub(crate) const LOGIN_PATH: &str = "/auth/login";
pub(crate) const REFRESH_PATH: &str = "/auth/refresh";
pub(crate) const LOGOUT_PATH: &str = "/auth/logout";

/// Path fragments whose requests never trigger refresh-and-retry, so bad credentials cannot
/// loop through the refresh endpoint.
pub const AUTH_BYPASS_PATHS: [&str; 3] = [LOGIN_PATH, REFRESH_PATH, LOGOUT_PATH];

/// Whether a request to `uri` is exempt from refresh-and-retry.
pub fn is_auth_endpoint(uri: &Uri) -> bool {
    let path = uri.path();
    AUTH_BYPASS_PATHS.iter().any(|fragment| path.contains(fragment))
}

/// Stateful client for the HirePrep API with silent token refresh.
///
/// - Reads and writes the access token through a pluggable [`CredentialStore`].
/// - Retries a request at most once after a successful refresh.
/// - Fires the [`LoginRedirect`] hook once when the session cannot be recovered.
///
/// Example
/// ```ignore
/// use hireprep::client::AuthenticatedClient;
/// use hireprep::config::ClientConfig;
///
/// #[tokio::main]
/// async fn main() -> miette::Result<()> {
///     let client = AuthenticatedClient::from_config(ClientConfig::from_env()?)?;
///     client.login("alice", "hunter22").await?;
///     let me = client.me().await?;
///     println!("{} <{}>", me.username, me.email);
///     Ok(())
/// }
/// ```
pub struct AuthenticatedClient<T, S = MemoryCredentialStore> {
    transport: T,
    store: Arc<S>,
    config: ClientConfig,
    redirect: Arc<dyn LoginRedirect>,
    coordinator: RefreshCoordinator,
}

impl AuthenticatedClient<reqwest::Client> {
    /// Client over a cookie-enabled `reqwest` transport with an in-memory token store.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let transport = cookie_transport(config.request_timeout)?;
        Ok(Self::new(transport, config))
    }
}

impl<T> AuthenticatedClient<T> {
    /// Create a client over `transport` with an in-memory token store.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_store(transport, config, Arc::new(MemoryCredentialStore::new()))
    }
}

impl<T, S> AuthenticatedClient<T, S>
where
    S: CredentialStore + 'static,
{
    /// Create a client using the given transport and token store.
    pub fn with_store(transport: T, config: ClientConfig, store: Arc<S>) -> Self {
        let redirect: Arc<dyn LoginRedirect> = Arc::new(LogRedirect);
        let coordinator =
            RefreshCoordinator::new(store.clone(), redirect.clone(), config.refresh_timeout);
        Self {
            transport,
            store,
            config,
            redirect,
            coordinator,
        }
    }

    /// Return a copy that fires `redirect` when the session ends.
    pub fn with_redirect(self, redirect: Arc<dyn LoginRedirect>) -> Self {
        let coordinator = RefreshCoordinator::new(
            self.store.clone(),
            redirect.clone(),
            self.config.refresh_timeout,
        );
        Self {
            transport: self.transport,
            store: self.store,
            config: self.config,
            redirect,
            coordinator,
        }
    }

    /// Current access token, if logged in.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.store.get()
    }

    /// Token store backing this client.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Refresh coordinator shared by every request on this client.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request builder targeting `path` under the API base.
    pub fn request(&self, method: Method, path: &str) -> http::request::Builder {
        http::Request::builder()
            .method(method)
            .uri(self.config.endpoint(path))
    }

    /// Drop the token if it is still `token`, firing the login redirect when that ends the
    /// session.
    fn end_session(&self, token: &AccessToken) {
        if self.store.clear_if(token) {
            #[cfg(feature = "tracing")]
            tracing::warn!("request rejected after refresh, ending session");
            self.redirect.redirect_to_login();
        }
    }
}

impl<T, S> AuthenticatedClient<T, S>
where
    T: HttpClient + Sync,
    S: CredentialStore + 'static,
{
    /// Send a request with the current bearer token attached.
    ///
    /// Every response the server produced is returned as `Ok`, including error statuses.
    /// A 401 on a non-auth endpoint triggers one refresh and one resend; if the refresh
    /// fails the result is [`AuthError::RefreshFailed`](hireprep_common::error::AuthError).
    /// A 401 for a session that was cleared while the request was in flight is returned as is.
    pub async fn send(&self, request: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>> {
        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "hireprep_send",
            method = %request.method(),
            path = request.uri().path()
        );

        let fut = self.send_with_refresh(request);
        #[cfg(feature = "tracing")]
        let fut = tracing::Instrument::instrument(fut, span);
        fut.await
    }

    async fn send_with_refresh(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> Result<http::Response<Vec<u8>>> {
        let prepared = PreparedRequest::from(request);
        let mut ctx = RequestContext::new(&prepared.uri);

        let sent_with = self.store.get();
        let response = self.dispatch(&prepared, sent_with.as_ref()).await?;
        if !ctx.should_refresh(response.status()) {
            return Ok(response);
        }

        ctx.retried = true;
        let Some(token) = self.renew(sent_with.as_ref()).await? else {
            return Ok(response);
        };
        let response = self.dispatch(&prepared, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.end_session(&token);
        }
        Ok(response)
    }

    /// Token to retry with after a 401 on a request sent with `sent_with`.
    ///
    /// `None` when the session this request belonged to has already ended (a failed refresh or
    /// a logout cleared the store while it was on the wire); the 401 then stands as is.
    async fn renew(&self, sent_with: Option<&AccessToken>) -> Result<Option<AccessToken>> {
        match (self.store.get(), sent_with) {
            // someone refreshed (or logged in) while this request was on the wire
            (Some(current), sent) if Some(&current) != sent => return Ok(Some(current)),
            (None, Some(_)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("session ended while request was in flight, not refreshing");
                return Ok(None);
            }
            _ => {}
        }
        let token = self
            .coordinator
            .refresh(|| auth::request_refresh(&self.transport, &self.config))
            .await?;
        Ok(Some(token))
    }

    async fn dispatch(
        &self,
        prepared: &PreparedRequest,
        token: Option<&AccessToken>,
    ) -> Result<http::Response<Vec<u8>>> {
        let request = prepared.build(token)?;
        self.transport
            .send_http(request)
            .await
            .map_err(|e| ClientError::Transport(transport_error(e)))
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        let request = self
            .request(Method::GET, path)
            .body(Vec::new())
            .map_err(TransportError::from)?;
        Ok(self.send(request).await?.into())
    }

    /// `DELETE path`.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        let request = self
            .request(Method::DELETE, path)
            .body(Vec::new())
            .map_err(TransportError::from)?;
        Ok(self.send(request).await?.into())
    }

    /// `POST path` with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send_json(Method::POST, path, body).await
    }

    /// `PUT path` with a JSON body.
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send_json(Method::PUT, path, body).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_vec(body).map_err(EncodeError::from)?;
        let request = self
            .request(method, path)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(TransportError::from)?;
        Ok(self.send(request).await?.into())
    }
}

impl<T, S> std::fmt::Debug for AuthenticatedClient<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// Per-call metadata: whether the request may enter the refresh path at all, and whether it
/// already has.
#[derive(Debug, Clone, Copy)]
struct RequestContext {
    bypass: bool,
    retried: bool,
}

impl RequestContext {
    fn new(uri: &Uri) -> Self {
        Self {
            bypass: is_auth_endpoint(uri),
            retried: false,
        }
    }

    fn should_refresh(&self, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED && !self.bypass && !self.retried
    }
}

/// Owned copy of a request that can be rebuilt with a different token.
struct PreparedRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl From<http::Request<Vec<u8>>> for PreparedRequest {
    fn from(request: http::Request<Vec<u8>>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
        }
    }
}

impl PreparedRequest {
    fn build(&self, token: Option<&AccessToken>) -> std::result::Result<http::Request<Vec<u8>>, TransportError> {
        let mut request = http::Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        let headers = request.headers_mut();
        *headers = self.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            let value = token.bearer().map_err(|e| {
                TransportError::InvalidRequest(format!("Invalid authorization token: {}", e))
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

/// Keep the variant when the transport already speaks [`TransportError`].
fn transport_error<E>(e: E) -> TransportError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
    match boxed.downcast::<TransportError>() {
        Ok(inner) => *inner,
        Err(other) => TransportError::Other(other),
    }
}
