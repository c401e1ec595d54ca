//! Single-flight access-token refresh.
//!
//! The first caller to ask for a refresh while the coordinator is idle becomes the leader and
//! performs the round-trip. Callers that arrive while it is in flight park a oneshot sender in
//! a FIFO queue and receive the leader's outcome, in arrival order, when it settles. If the
//! leader is dropped first, the parked callers start over and one of them takes the lead.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hireprep_common::{AccessToken, CredentialStore, error::RefreshError};
use tokio::sync::oneshot;

use crate::redirect::LoginRedirect;

type Outcome = Result<AccessToken, RefreshError>;

enum State {
    Idle,
    Refreshing(VecDeque<oneshot::Sender<Outcome>>),
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<Outcome>),
}

/// Guarantees at most one refresh round-trip in flight and fans its result out to every
/// caller that arrived meanwhile.
///
/// On success the new token is written to the credential store before any waiter is
/// released. On failure the store is cleared and the login redirect fires once.
pub struct RefreshCoordinator {
    state: Mutex<State>,
    store: Arc<dyn CredentialStore>,
    redirect: Arc<dyn LoginRedirect>,
    timeout: Duration,
}

impl RefreshCoordinator {
    /// Create an idle coordinator writing to `store` and bounding each refresh by `timeout`.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        redirect: Arc<dyn LoginRedirect>,
        timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(State::Idle),
            store,
            redirect,
            timeout,
        }
    }

    /// Refresh timeout in effect.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), State::Refreshing(_))
    }

    /// Number of callers parked behind the in-flight refresh.
    pub fn queued(&self) -> usize {
        match &*self.lock() {
            State::Idle => 0,
            State::Refreshing(waiters) => waiters.len(),
        }
    }

    /// Obtain a fresh access token.
    ///
    /// `refresh` is invoked only if no refresh is in flight; otherwise the caller waits for
    /// the current one and shares its outcome. A caller whose leader went away without
    /// settling tries again, and may end up invoking `refresh` itself.
    pub async fn refresh<F, Fut>(&self, refresh: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        loop {
            match self.join() {
                Role::Leader => return self.lead(refresh).await,
                Role::Waiter(rx) => match rx.await {
                    Ok(outcome) => return outcome,
                    // leader dropped, sender discarded with the queue
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("refresh leader dropped, retrying");
                    }
                },
            }
        }
    }

    fn join(&self) -> Role {
        let mut state = self.lock();
        match &mut *state {
            State::Idle => {
                *state = State::Refreshing(VecDeque::new());
                Role::Leader
            }
            State::Refreshing(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                Role::Waiter(rx)
            }
        }
    }

    async fn lead<F, Fut>(&self, refresh: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let flight = Flight {
            coordinator: self,
            settled: false,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(timeout = ?self.timeout, "refreshing access token");

        let outcome = match tokio::time::timeout(self.timeout, refresh()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RefreshError::Timeout),
        };

        match &outcome {
            Ok(token) => self.store.set(token.clone()),
            Err(_) => self.store.clear(),
        }

        let waiters = flight.settle();

        #[cfg(feature = "tracing")]
        match &outcome {
            Ok(_) => tracing::debug!(waiters = waiters.len(), "access token refreshed"),
            Err(e) => tracing::warn!(waiters = waiters.len(), error = %e, "access token refresh failed"),
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        if outcome.is_err() {
            self.redirect.redirect_to_login();
        }

        outcome
    }

    /// Swap back to idle and hand over the parked waiters.
    fn drain(&self) -> VecDeque<oneshot::Sender<Outcome>> {
        match std::mem::replace(&mut *self.lock(), State::Idle) {
            State::Idle => VecDeque::new(),
            State::Refreshing(waiters) => waiters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("queued", &self.queued())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Leader-side guard. If the leader is dropped mid-refresh, the coordinator goes back to idle
/// and the parked senders are discarded, which wakes every waiter to try again.
struct Flight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Flight<'_> {
    fn settle(mut self) -> VecDeque<oneshot::Sender<Outcome>> {
        self.settled = true;
        self.coordinator.drain()
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        drop(self.coordinator.drain());
    }
}
