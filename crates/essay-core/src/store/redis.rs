//! Redis-backed state store

use super::StateStore;
use crate::error::{EssayflowError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;

/// Production store implementation. One multiplexed connection per call
/// keeps the type `Send + Sync` without holding connection state.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| EssayflowError::Config(format!("Invalid Redis URL: {}", e)))?;

        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| EssayflowError::Store(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| EssayflowError::Store(format!("GET {} failed: {}", key, e)))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| EssayflowError::Store(format!("SET {} failed: {}", key, e)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        conn.exists(key)
            .await
            .map_err(|e| EssayflowError::Store(format!("EXISTS {} failed: {}", key, e)))
    }
}
