//! In-process session store.

use super::SessionStore;
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Map-backed [`SessionStore`]; clones share the same slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds consistent string slots.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.slots().get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<(), Error> {
        self.slots().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        Ok(self.slots().remove(key).is_some())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| !key.starts_with(prefix));
        Ok((before - slots.len()) as u64)
    }
}
