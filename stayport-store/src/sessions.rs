use std::sync::Arc;

use chrono::Utc;
use stayport_core::session::SessionData;
use tracing::{error, info};
use uuid::Uuid;

use crate::redis_repo::RedisClient;

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

/// Server-side session records with a sliding idle timeout. The id handed
/// to the browser is an unguessable UUID; everything else stays in the
/// store.
pub struct SessionStore {
    redis: Arc<RedisClient>,
    ttl_seconds: u64,
}

impl SessionStore {
    pub fn new(redis: Arc<RedisClient>, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Persist a new session and return its id. `None` means the store is
    /// unreachable; callers must treat that as a hard failure rather than
    /// proceed unauthenticated.
    pub async fn create(&self, data: &SessionData) -> Option<String> {
        let session_id = Uuid::new_v4().to_string();
        let payload = match serde_json::to_string(data) {
            Ok(payload) => payload,
            Err(err) => {
                error!("Failed to encode session payload: {}", err);
                return None;
            }
        };

        match self
            .redis
            .set_ex(&session_key(&session_id), &payload, self.ttl_seconds)
            .await
        {
            Ok(()) => {
                info!(
                    "Created session {} for reservation {}",
                    session_id, data.reservation_id
                );
                Some(session_id)
            }
            Err(err) => {
                error!("Failed to create session: {}", err);
                None
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionData> {
        let payload = match self.redis.get(&session_key(session_id)).await {
            Ok(found) => found?,
            Err(err) => {
                error!("Failed to read session {}: {}", session_id, err);
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(data) => Some(data),
            Err(err) => {
                error!("Corrupt session payload for {}: {}", session_id, err);
                None
            }
        }
    }

    /// Push the expiry a full TTL into the future. Returns false when the
    /// session no longer exists (or the store is down).
    pub async fn refresh(&self, session_id: &str) -> bool {
        match self
            .redis
            .expire(&session_key(session_id), self.ttl_seconds as i64)
            .await
        {
            Ok(extended) => extended,
            Err(err) => {
                error!("Failed to refresh session {}: {}", session_id, err);
                false
            }
        }
    }

    /// Idempotent delete.
    pub async fn destroy(&self, session_id: &str) -> bool {
        match self.redis.del(&session_key(session_id)).await {
            Ok(()) => true,
            Err(err) => {
                error!("Failed to destroy session {}: {}", session_id, err);
                false
            }
        }
    }
}

/// Convenience constructor for session payloads stamped "now".
pub fn new_session_data(
    reservation_id: &str,
    confirmation_code: &str,
    guest_name: &str,
    listing_id: &str,
    is_demo: bool,
) -> SessionData {
    SessionData {
        reservation_id: reservation_id.to_string(),
        confirmation_code: confirmation_code.to_string(),
        guest_name: guest_name.to_string(),
        listing_id: listing_id.to_string(),
        is_demo,
        created_at: Utc::now().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key("abc"), "session:abc");
    }

    #[test]
    fn test_new_session_data_stamps_creation() {
        let before = Utc::now().timestamp_millis();
        let data = new_session_data("res-1", "CONF1", "Guest", "listing-1", false);
        assert_eq!(data.reservation_id, "res-1");
        assert!(!data.is_demo);
        assert!(data.created_at >= before);
    }
}
