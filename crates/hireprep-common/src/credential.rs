use std::sync::{Arc, PoisonError, RwLock};

use crate::token::AccessToken;

/// Pluggable storage for the current access token.
///
/// Pure state: no I/O and no error conditions. Writes must be visible to the next `get`
/// immediately, from any task.
pub trait CredentialStore: Send + Sync {
    /// Current token, if any.
    fn get(&self) -> Option<AccessToken>;
    /// Overwrite the stored token.
    fn set(&self, token: AccessToken);
    /// Remove the stored token.
    fn clear(&self);
    /// Remove the stored token only if it is still `expected`. Returns whether it was removed.
    ///
    /// The default implementation is not atomic; stores shared across tasks should override it.
    fn clear_if(&self, expected: &AccessToken) -> bool {
        if self.get().as_ref() == Some(expected) {
            self.clear();
            true
        } else {
            false
        }
    }
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn get(&self) -> Option<AccessToken> {
        self.as_ref().get()
    }
    fn set(&self, token: AccessToken) {
        self.as_ref().set(token)
    }
    fn clear(&self) {
        self.as_ref().clear()
    }
    fn clear_if(&self, expected: &AccessToken) -> bool {
        self.as_ref().clear_if(expected)
    }
}

/// In-memory credential store scoped to the running client.
///
/// Cloning shares the underlying slot.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore(Arc<RwLock<Option<AccessToken>>>);

impl MemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `token`.
    pub fn with_token(token: impl Into<AccessToken>) -> Self {
        Self(Arc::new(RwLock::new(Some(token.into()))))
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("present", &self.get().is_some())
            .finish()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<AccessToken> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, token: AccessToken) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn clear(&self) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn clear_if(&self, expected: &AccessToken) -> bool {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref() == Some(expected) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_exact_token() {
        let store = MemoryCredentialStore::new();
        assert!(store.get().is_none());
        store.set(AccessToken::new("t"));
        assert_eq!(store.get(), Some(AccessToken::new("t")));
        store.set(AccessToken::new("u"));
        assert_eq!(store.get(), Some(AccessToken::new("u")));
    }

    #[test]
    fn clear_removes_token() {
        let store = MemoryCredentialStore::with_token("t");
        store.clear();
        assert!(store.get().is_none());
        // clearing an empty store is fine
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryCredentialStore::new();
        let other = store.clone();
        other.set(AccessToken::new("shared"));
        assert_eq!(store.get().unwrap().as_str(), "shared");
    }

    #[test]
    fn clear_if_only_matches_current_token() {
        let store = MemoryCredentialStore::with_token("new");
        assert!(!store.clear_if(&AccessToken::new("old")));
        assert_eq!(store.get().unwrap().as_str(), "new");
        assert!(store.clear_if(&AccessToken::new("new")));
        assert!(store.get().is_none());
        assert!(!store.clear_if(&AccessToken::new("new")));
    }

    #[test]
    fn clear_if_through_shared_trait_object() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::with_token("a"));
        assert!(store.clear_if(&AccessToken::new("a")));
        assert!(store.get().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_visible_across_tasks() {
        let store = MemoryCredentialStore::new();
        let writer = store.clone();
        tokio::spawn(async move { writer.set(AccessToken::new("from-task")) })
            .await
            .unwrap();
        assert_eq!(store.get().unwrap().as_str(), "from-task");
    }
}
