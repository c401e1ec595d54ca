//! Hook fired when the session ends without the user asking for it.

/// Sends the user back to the login entry point.
///
/// Fired once per terminated session: after a refresh fails, or after a request still gets
/// 401 with a freshly refreshed token. Explicit logout does not fire it.
pub trait LoginRedirect: Send + Sync {
    /// Navigate to login.
    fn redirect_to_login(&self);
}

impl<F> LoginRedirect for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}

/// Default hook: records the event and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        #[cfg(feature = "tracing")]
        tracing::warn!("session ended, login required");
    }
}
