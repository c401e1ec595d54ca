//! In-process stand-in for the HirePrep backend.
//!
//! Protected routes accept exactly one bearer token (the "valid" token); `/auth/refresh`
//! replies from a script and can be held open until a test releases it.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hireprep::config::ClientConfig;
use hireprep_common::http_client::HttpClient;
use http::{StatusCode, header::AUTHORIZATION};
use tokio::sync::Semaphore;

pub const BASE: &str = "http://api.test";

/// Scripted answer for one `/auth/refresh` call.
#[derive(Clone, Debug)]
pub enum RefreshReply {
    /// 200 with this token; the mock starts accepting it.
    Token(&'static str),
    /// 200 with this token, but protected routes keep rejecting it.
    TokenRejected(&'static str),
    /// Non-2xx with a FastAPI error body.
    Status(StatusCode),
    /// 200 without an access token.
    Garbage,
    /// Never answers.
    Hang,
}

#[derive(Clone)]
struct Route {
    status: StatusCode,
    body: Vec<u8>,
    protected: bool,
}

type Hook = Box<dyn Fn(&http::Request<Vec<u8>>) + Send + Sync>;

#[derive(Default)]
struct Inner {
    valid: Mutex<Option<String>>,
    account: Mutex<Option<(String, String, String)>>,
    routes: Mutex<HashMap<String, Route>>,
    refresh_plan: Mutex<VecDeque<RefreshReply>>,
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    hooks: Mutex<Vec<(String, Hook)>>,
    holds: Mutex<HashMap<String, Arc<Semaphore>>>,
    log: Mutex<Vec<http::Request<Vec<u8>>>>,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockServer {
    inner: Arc<Inner>,
}

#[derive(Debug, thiserror::Error)]
#[error("mock transport failure")]
pub struct MockError;

impl MockServer {
    /// Server whose protected routes accept `valid`.
    pub fn new(valid: Option<&str>) -> Self {
        let server = Self::default();
        *server.inner.valid.lock().unwrap() = valid.map(str::to_string);
        server
    }

    pub fn config() -> ClientConfig {
        ClientConfig::with_base(BASE).unwrap()
    }

    pub fn config_with_refresh_timeout(timeout: Duration) -> ClientConfig {
        ClientConfig::new()
            .base_url(BASE.parse().unwrap())
            .refresh_timeout(timeout)
            .build()
    }

    /// Register the account `/auth/login` accepts; a successful login issues `token`.
    pub fn account(&self, username: &str, password: &str, token: &str) {
        *self.inner.account.lock().unwrap() =
            Some((username.into(), password.into(), token.into()));
    }

    pub fn accept(&self, token: Option<&str>) {
        *self.inner.valid.lock().unwrap() = token.map(str::to_string);
    }

    /// Fixed reply for `path`. Protected routes still answer 401 to a wrong token.
    pub fn route(&self, path: &str, status: StatusCode, body: serde_json::Value, protected: bool) {
        self.inner.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status,
                body: serde_json::to_vec(&body).unwrap(),
                protected,
            },
        );
    }

    pub fn refresh_with(&self, reply: RefreshReply) {
        self.inner.refresh_plan.lock().unwrap().push_back(reply);
    }

    /// Hold every `/auth/refresh` call until [`MockServer::release_refresh`].
    pub fn gate_refresh(&self) {
        *self.inner.refresh_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_refresh(&self) {
        if let Some(gate) = self.inner.refresh_gate.lock().unwrap().as_ref() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Hold requests for `path` after they arrive, answering only once [`MockServer::release`]
    /// is called. The token check happens after the hold.
    pub fn hold(&self, path: &str) {
        self.inner
            .holds
            .lock()
            .unwrap()
            .insert(path.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, path: &str) {
        if let Some(gate) = self.inner.holds.lock().unwrap().get(path) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Run `hook` whenever a request for `path` arrives, before it is answered.
    pub fn on_request(&self, path: &str, hook: impl Fn(&http::Request<Vec<u8>>) + Send + Sync + 'static) {
        self.inner
            .hooks
            .lock()
            .unwrap()
            .push((path.to_string(), Box::new(hook)));
    }

    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn unauthorized(&self) -> usize {
        self.inner.unauthorized.load(Ordering::SeqCst)
    }

    /// Copies of every request received so far, in arrival order.
    pub fn log(&self) -> Vec<http::Request<Vec<u8>>> {
        self.inner.log.lock().unwrap().iter().map(copy).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.log().iter().map(|r| r.uri().path().to_string()).collect()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.log().iter().filter(|r| r.uri().path() == path).count()
    }

    async fn handle(&self, request: http::Request<Vec<u8>>) -> http::Response<Vec<u8>> {
        let path = request.uri().path().to_string();
        for (hook_path, hook) in self.inner.hooks.lock().unwrap().iter() {
            if *hook_path == path {
                hook(&request);
            }
        }
        let bearer = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        let body = request.body().clone();
        self.inner.log.lock().unwrap().push(request);

        let hold = self.inner.holds.lock().unwrap().get(&path).cloned();
        if let Some(gate) = hold {
            gate.acquire().await.unwrap().forget();
        }

        let route = self.inner.routes.lock().unwrap().get(&path).cloned();
        match (path.as_str(), route) {
            (_, Some(route)) => self.serve(route, bearer),
            ("/auth/refresh", None) => self.refresh().await,
            ("/auth/login", None) => self.login(&body),
            ("/auth/logout", None) => reply(StatusCode::NO_CONTENT, Vec::new()),
            (_, None) => {
                let body = serde_json::to_vec(&serde_json::json!({ "path": path })).unwrap();
                self.serve(
                    Route {
                        status: StatusCode::OK,
                        body,
                        protected: true,
                    },
                    bearer,
                )
            }
        }
    }

    fn serve(&self, route: Route, bearer: Option<String>) -> http::Response<Vec<u8>> {
        let valid = self.inner.valid.lock().unwrap().clone();
        if route.protected && (bearer.is_none() || bearer != valid) {
            self.inner.unauthorized.fetch_add(1, Ordering::SeqCst);
            return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
        }
        reply(route.status, route.body)
    }

    async fn refresh(&self) -> http::Response<Vec<u8>> {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        let next = self.inner.refresh_plan.lock().unwrap().pop_front();
        match next.unwrap_or(RefreshReply::Status(StatusCode::UNAUTHORIZED)) {
            RefreshReply::Token(token) => {
                self.accept(Some(token));
                token_body(token)
            }
            RefreshReply::TokenRejected(token) => token_body(token),
            RefreshReply::Status(status) => detail(status, "Invalid or expired refresh token"),
            RefreshReply::Garbage => reply(StatusCode::OK, b"{\"token_type\":\"bearer\"}".to_vec()),
            RefreshReply::Hang => std::future::pending().await,
        }
    }

    fn login(&self, body: &[u8]) -> http::Response<Vec<u8>> {
        let form: HashMap<String, String> = serde_html_form::from_bytes(body).unwrap_or_default();
        let account = self.inner.account.lock().unwrap().clone();
        match account {
            Some((user, pass, token))
                if form.get("username") == Some(&user) && form.get("password") == Some(&pass) =>
            {
                self.accept(Some(&token));
                let body = serde_json::json!({
                    "access_token": token,
                    "token_type": "bearer",
                    "reset_password": 1,
                });
                reply(StatusCode::OK, serde_json::to_vec(&body).unwrap())
            }
            _ => detail(StatusCode::UNAUTHORIZED, "Incorrect username or password"),
        }
    }
}

fn copy(request: &http::Request<Vec<u8>>) -> http::Request<Vec<u8>> {
    let mut copy = http::Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.headers_mut() = request.headers().clone();
    copy
}

fn reply(status: StatusCode, body: Vec<u8>) -> http::Response<Vec<u8>> {
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

fn detail(status: StatusCode, message: &str) -> http::Response<Vec<u8>> {
    reply(
        status,
        serde_json::to_vec(&serde_json::json!({ "detail": message })).unwrap(),
    )
}

fn token_body(token: &str) -> http::Response<Vec<u8>> {
    reply(
        StatusCode::OK,
        serde_json::to_vec(&serde_json::json!({ "access_token": token, "token_type": "bearer" }))
            .unwrap(),
    )
}

impl HttpClient for MockServer {
    type Error = MockError;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let server = self.clone();
        async move { Ok(server.handle(request).await) }
    }
}

/// Counts login redirects.
#[derive(Default)]
pub struct CountingRedirect(AtomicUsize);

impl CountingRedirect {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl hireprep::redirect::LoginRedirect for CountingRedirect {
    fn redirect_to_login(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds, for up to five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..5_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never became true");
}

pub fn bearer_of(request: &http::Request<Vec<u8>>) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap().to_string())
}
