use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Buffer subtracted from a token's expiry before it is considered stale.
pub const TOKEN_EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// A bearer token together with its absolute expiry (unix milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: i64,
}

impl CachedToken {
    /// Usable while `now` is comfortably before expiry.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at - TOKEN_EXPIRY_BUFFER_MS
    }
}

/// Storage seam for the access-token cache. Two implementations exist:
/// a process-local one and one backed by the shared key-value store, so
/// token reuse survives across short-lived invocations.
#[async_trait]
pub trait TokenCacheStore: Send + Sync {
    async fn get(&self) -> Option<CachedToken>;
    async fn put(&self, token: &CachedToken);
    async fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_window() {
        let token = CachedToken {
            access_token: "tok".into(),
            expires_at: 1_000_000,
        };
        assert!(token.is_fresh(1_000_000 - TOKEN_EXPIRY_BUFFER_MS - 1));
        assert!(!token.is_fresh(1_000_000 - TOKEN_EXPIRY_BUFFER_MS));
        assert!(!token.is_fresh(1_000_000));
    }
}
