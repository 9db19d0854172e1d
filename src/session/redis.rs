//! Redis-backed session storage, for clients that share a session across hosts

use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

use super::storage::SessionStorage;

/// Session keys stored as `{prefix}:{key}` strings
#[derive(Clone)]
pub struct RedisStorage {
    client: Client,
    prefix: String,
}

impl RedisStorage {
    /// Connect and verify the server answers
    pub async fn new(url: &str, prefix: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Storage(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Storage(format!("Redis connection test failed: {}", e)))?;

        Ok(Self {
            client,
            prefix: prefix.trim_end_matches(':').to_string(),
        })
    }

    /// Namespaced Redis key for a session key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Get a multiplexed connection for one command
    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl SessionStorage for RedisStorage {
    /// Read a session key; `None` when unset
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    /// Write a session key without expiry
    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(self.key(key), value).await?;
        Ok(())
    }

    /// Delete a session key; missing keys are fine
    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }
}
