use std::sync::{Mutex, MutexGuard, PoisonError};

use super::TokenStore;

#[derive(Default, Debug)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

/// A process-local store. Used by tests and by sessions that should not persist.
#[derive(Default, Debug)]
pub struct MemoryTokenStore {
    slots: Mutex<Slots>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a session, handy for resuming in tests.
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        store.store_pair(access, refresh);
        store
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.slots().access.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.slots().refresh.clone()
    }

    fn set_access_token(&self, token: &str) {
        self.slots().access = Some(token.to_string());
    }

    fn set_refresh_token(&self, token: &str) {
        self.slots().refresh = Some(token.to_string());
    }

    fn clear_access_token(&self) {
        self.slots().access = None;
    }

    fn clear_refresh_token(&self) {
        self.slots().refresh = None;
    }

    fn store_pair(&self, access: &str, refresh: &str) {
        let mut slots = self.slots();
        slots.access = Some(access.to_string());
        slots.refresh = Some(refresh.to_string());
    }

    fn clear(&self) {
        *self.slots() = Slots::default();
    }
}
