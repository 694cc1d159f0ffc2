use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use stayport_core::token::{CachedToken, TokenCacheStore};
use tracing::error;

use crate::redis_repo::RedisClient;

const TOKEN_CACHE_KEY: &str = "pms:access_token";
/// Cache slightly less long than the token lives so a stale entry can never
/// outlast the token itself.
const TOKEN_CACHE_TTL_MARGIN_SECONDS: i64 = 600;

/// Process-local cache. Only helps within one warm instance; used when no
/// store is configured.
#[derive(Default)]
pub struct MemoryTokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCacheStore for MemoryTokenCache {
    async fn get(&self) -> Option<CachedToken> {
        self.inner.lock().expect("token cache lock").clone()
    }

    async fn put(&self, token: &CachedToken) {
        *self.inner.lock().expect("token cache lock") = Some(token.clone());
    }

    async fn clear(&self) {
        *self.inner.lock().expect("token cache lock") = None;
    }
}

/// Store-backed cache under a single known key, shared by every process.
/// Keeps load off the strictly rate-limited token-issuance endpoint.
pub struct RedisTokenCache {
    redis: Arc<RedisClient>,
}

impl RedisTokenCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl TokenCacheStore for RedisTokenCache {
    async fn get(&self) -> Option<CachedToken> {
        let payload = match self.redis.get(TOKEN_CACHE_KEY).await {
            Ok(found) => found?,
            Err(err) => {
                error!("Token cache read failed: {}", err);
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(token) => Some(token),
            Err(err) => {
                error!("Corrupt token cache entry: {}", err);
                None
            }
        }
    }

    async fn put(&self, token: &CachedToken) {
        let ttl =
            (token.expires_at - Utc::now().timestamp_millis()) / 1000 - TOKEN_CACHE_TTL_MARGIN_SECONDS;
        if ttl <= 0 {
            return;
        }

        let payload = match serde_json::to_string(token) {
            Ok(payload) => payload,
            Err(err) => {
                error!("Failed to encode token cache entry: {}", err);
                return;
            }
        };

        if let Err(err) = self.redis.set_ex(TOKEN_CACHE_KEY, &payload, ttl as u64).await {
            error!("Token cache write failed: {}", err);
        }
    }

    async fn clear(&self) {
        if let Err(err) = self.redis.del(TOKEN_CACHE_KEY).await {
            error!("Token cache clear failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryTokenCache::new();
        assert!(cache.get().await.is_none());

        let token = CachedToken {
            access_token: "tok".into(),
            expires_at: Utc::now().timestamp_millis() + 86_400_000,
        };
        cache.put(&token).await;
        assert_eq!(cache.get().await.unwrap().access_token, "tok");

        cache.clear().await;
        assert!(cache.get().await.is_none());
    }
}
