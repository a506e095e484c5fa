//! In-memory state store for tests and single-process deployments

use super::StateStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

/// HashMap-backed store honoring per-key TTL.
///
/// Expired entries are dropped lazily on access; the tokio clock is used so
/// expiry is observable under a paused test runtime.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().expect("memory store lock poisoned");

        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        entries.insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.get(key).await.map(|value| value.is_some())
    }
}
