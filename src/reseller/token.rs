//! Access-token caching.
//!
//! The cache is owned by whoever builds the client and passed in, so tests
//! (and multi-tenant callers) can substitute their own store and clock.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Wall clock seam.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A bearer token and the instant it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: SystemTime,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Storage for the current token.
pub trait TokenCache: Send + Sync {
    /// The cached token, if it is still valid.
    fn get(&self) -> Option<AccessToken>;
    fn set(&self, token: AccessToken);
    fn clear(&self);
}

/// Process-local cache.
pub struct InMemoryTokenCache {
    slot: RwLock<Option<AccessToken>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            clock,
        }
    }
}

impl Default for InMemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self) -> Option<AccessToken> {
        let now = self.clock.now();
        // A poisoned lock only means a writer panicked; the slot is still a plain Option.
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().filter(|t| t.is_valid_at(now)).cloned()
    }

    fn set(&self, token: AccessToken) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
