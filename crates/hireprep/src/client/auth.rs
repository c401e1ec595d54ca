//! Typed wrappers over the `/auth` endpoints.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use hireprep_common::{
    AccessToken, CredentialStore,
    error::{AuthError, ClientError, EncodeError, HttpError, RefreshError, Result, TransportError},
    http_client::HttpClient,
};
use http::{Method, StatusCode, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AuthenticatedClient, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
use crate::config::ClientConfig;

const REGISTER_PATH: &str = "/auth/register";

/// Minimum password length enforced by the backend.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize)]
struct LoginForm<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: AccessToken,
    #[serde(default = "bearer")]
    token_type: String,
    #[serde(default)]
    reset_password: i64,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: AccessToken,
}

fn bearer() -> String {
    "bearer".to_string()
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Token scheme reported by the server (always `bearer` today).
    pub token_type: String,
    /// The account still uses its emailed temporary password and must change it.
    pub must_change_password: bool,
}

/// The logged-in account, as returned by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Account id
    pub id: i64,
    /// Login name
    pub username: String,
    /// Contact address
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Date of birth
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    /// `1` while the account is on its temporary password
    #[serde(default)]
    pub reset_password: i64,
    /// Companies the user is preparing for
    #[serde(default)]
    pub target_companies: Vec<String>,
    /// Free-form progress counters (`totalSolved`, ...)
    #[serde(default)]
    pub stats: serde_json::Map<String, serde_json::Value>,
    /// Registration time (server-local, no offset)
    pub created_at: NaiveDateTime,
}

impl User {
    /// Whether the account is still on its temporary password.
    pub fn must_change_password(&self) -> bool {
        self.reset_password == 1
    }

    /// Distinct problems with an accepted submission.
    pub fn total_solved(&self) -> Option<u64> {
        self.stats.get("totalSolved").and_then(|v| v.as_u64())
    }
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    temp_password: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

/// New account details for `/auth/register`.
///
/// The server emails a temporary password to `email`; log in with it, then call
/// [`AuthenticatedClient::change_password`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, bon::Builder)]
#[builder(start_fn = new)]
pub struct Registration {
    /// Display name
    #[builder(into)]
    pub name: String,
    /// Login name, unique on the server
    #[builder(into)]
    pub username: String,
    /// Date of birth
    pub dob: NaiveDate,
    /// Contact address, unique on the server
    #[builder(into)]
    pub email: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    message: String,
}

impl<T, S> AuthenticatedClient<T, S>
where
    T: HttpClient + Sync,
    S: CredentialStore + 'static,
{
    /// Create an account. Returns the new user; no session is started.
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        #[cfg(feature = "tracing")]
        tracing::info!(username = %registration.username, "registering account");

        self.post_json(REGISTER_PATH, registration).await?.json()
    }

    /// Log in with username and password.
    ///
    /// Stores the returned access token; the refresh cookie is kept by the transport.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        #[cfg(feature = "tracing")]
        tracing::info!(username, "logging in");

        let form = serde_html_form::to_string(&LoginForm { username, password })
            .map_err(EncodeError::from)?;
        let request = self
            .request(Method::POST, LOGIN_PATH)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form.into_bytes())
            .map_err(TransportError::from)?;

        let response = ApiResponse::from(self.send(request).await?);
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials.into());
        }
        let login: LoginResponse = response.json()?;
        self.store.set(login.access_token);

        Ok(LoginOutcome {
            token_type: login.token_type,
            must_change_password: login.reset_password == 1,
        })
    }

    /// Revoke the refresh cookie server-side and drop the local token.
    ///
    /// The local token is cleared whatever the server answers; a transport failure is still
    /// reported afterwards.
    pub async fn logout(&self) -> Result<()> {
        let request = self
            .request(Method::POST, LOGOUT_PATH)
            .body(Vec::new())
            .map_err(TransportError::from)?;
        let sent = self.send(request).await;
        self.store.clear();

        let response = ApiResponse::from(sent?);
        #[cfg(feature = "tracing")]
        if let Some(err) = response.error() {
            tracing::debug!(error = %err, "server rejected logout, local session cleared anyway");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = response;
        Ok(())
    }

    /// Fetch the logged-in account.
    pub async fn me(&self) -> Result<User> {
        self.get("/auth/me").await?.json()
    }

    /// Replace the temporary password. Returns the server's confirmation message.
    pub async fn change_password(
        &self,
        temp_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String> {
        if new_password != confirm_password {
            return Err(ClientError::Validation("Passwords do not match".into()));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let body = ChangePasswordRequest {
            temp_password,
            new_password,
            confirm_password,
        };
        let reply: MessageResponse = self
            .post_json("/auth/change-password", &body)
            .await?
            .json()?;
        Ok(reply.message)
    }
}

/// One `/auth/refresh` round-trip.
///
/// Sent without an `Authorization` header: the refresh credential is the HTTP-only cookie the
/// transport replays. Any non-2xx answer is a refresh failure.
pub(crate) async fn request_refresh<T>(
    transport: &T,
    config: &ClientConfig,
) -> std::result::Result<AccessToken, RefreshError>
where
    T: HttpClient + Sync,
{
    let request = http::Request::builder()
        .method(Method::POST)
        .uri(config.endpoint(REFRESH_PATH))
        .body(Vec::new())
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let response = transport
        .send_http(request)
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    let body = Bytes::from(response.into_body());
    if !status.is_success() {
        let detail = HttpError {
            status,
            body: Some(body),
        }
        .detail();
        return Err(RefreshError::Rejected { status, detail });
    }

    let refreshed: RefreshResponse =
        serde_json::from_slice(&body).map_err(|e| RefreshError::Decode(e.to_string()))?;
    Ok(refreshed.access_token)
}
