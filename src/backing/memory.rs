use super::{BackingError, BackingStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-process backing store
///
/// Useful for running without memcached and for exercising the persistence
/// paths in tests. `set_available(false)` makes every call fail the way an
/// unreachable server would.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without going through the trait
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    /// Toggle simulated outage
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Current value for `key`, bypassing the availability switch
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn insert(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding this lock cannot leave the map half-written
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), BackingError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackingError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BackingError> {
        self.check_available()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BackingError> {
        self.check_available()?;
        self.insert(key, value);
        Ok(())
    }
}
