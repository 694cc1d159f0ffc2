use std::sync::Arc;

use stayport_core::upsell::{StatusChange, UpsellError, UpsellRequest, UpsellStatus};
use tracing::{info, warn};

use crate::redis_repo::RedisClient;

/// Sorted index of request ids scored by check-in timestamp, scanned by the
/// reminder sweep. Terminal requests are removed as they no longer need
/// scheduling.
const REMINDER_INDEX_KEY: &str = "pending_upsells";

fn request_key(request_id: &str) -> String {
    format!("upsell_request:{}", request_id)
}

fn reservation_set_key(reservation_id: &str) -> String {
    format!("reservation:{}:upsells", reservation_id)
}

fn intent_index_key(payment_intent_id: &str) -> String {
    format!("upsell_intent:{}", payment_intent_id)
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Upsell request not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] UpsellError),

    #[error("Store operation failed: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Authorization-request records indexed three ways: by id, by reservation
/// membership set, and by check-in date for the reminder sweep. A fourth
/// point index maps payment-intent ids to request ids.
pub struct UpsellLedger {
    redis: Arc<RedisClient>,
}

impl UpsellLedger {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    pub async fn store(&self, request: &UpsellRequest) -> Result<(), LedgerError> {
        let payload = serde_json::to_string(request)?;

        self.redis.set(&request_key(&request.id), &payload).await?;
        self.redis
            .sadd(&reservation_set_key(&request.reservation_id), &request.id)
            .await?;
        self.redis
            .set(&intent_index_key(&request.payment_intent_id), &request.id)
            .await?;

        if let Some(check_in) = request.check_in_date {
            let score = check_in
                .and_hms_opt(0, 0, 0)
                .expect("midnight is valid")
                .and_utc()
                .timestamp_millis();
            self.redis
                .zadd(REMINDER_INDEX_KEY, &request.id, score)
                .await?;
        }

        info!(
            "Stored upsell request {} for reservation {}",
            request.id, request.reservation_id
        );
        Ok(())
    }

    pub async fn get(&self, request_id: &str) -> Result<Option<UpsellRequest>, LedgerError> {
        match self.redis.get(&request_key(request_id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write status change. Transitions are one-way; replaying
    /// a transition into the state the record already holds is a no-op so
    /// webhook redeliveries stay harmless.
    pub async fn update_status(
        &self,
        request_id: &str,
        status: UpsellStatus,
        approved_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<StatusChange, LedgerError> {
        let mut request = self
            .get(request_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(request_id.to_string()))?;

        match request.plan_transition(status)? {
            StatusChange::NoOp => return Ok(StatusChange::NoOp),
            StatusChange::Applied => {}
        }

        request.status = status;
        if approved_at.is_some() {
            request.approved_at = approved_at;
        }

        let payload = serde_json::to_string(&request)?;
        self.redis.set(&request_key(request_id), &payload).await?;

        if status.is_terminal() {
            self.redis.zrem(REMINDER_INDEX_KEY, request_id).await?;
        }

        info!("Updated upsell request {} status to {:?}", request_id, status);
        Ok(StatusChange::Applied)
    }

    /// Point lookup through the payment-intent index, with a keyspace scan
    /// kept only for records written before the index existed.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<UpsellRequest>, LedgerError> {
        if let Some(request_id) = self.redis.get(&intent_index_key(payment_intent_id)).await? {
            return self.get(&request_id).await;
        }

        warn!(
            "Payment intent {} missing from index, falling back to scan",
            payment_intent_id
        );
        for key in self.redis.keys("upsell_request:*").await? {
            if let Some(payload) = self.redis.get(&key).await? {
                let request: UpsellRequest = serde_json::from_str(&payload)?;
                if request.payment_intent_id == payment_intent_id {
                    return Ok(Some(request));
                }
            }
        }
        Ok(None)
    }

    /// Every request tied to a reservation, newest first.
    pub async fn list_for_reservation(
        &self,
        reservation_id: &str,
    ) -> Result<Vec<UpsellRequest>, LedgerError> {
        let ids = self
            .redis
            .smembers(&reservation_set_key(reservation_id))
            .await?;

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(request) = self.get(&id).await? {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Approved requests whose check-in falls inside `[start_ms, end_ms]`,
    /// from the reminder index.
    pub async fn list_pending_in_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<UpsellRequest>, LedgerError> {
        let ids = self
            .redis
            .zrangebyscore(REMINDER_INDEX_KEY, start_ms, end_ms)
            .await?;

        let mut requests = Vec::new();
        for id in ids {
            if let Some(request) = self.get(&id).await? {
                if request.status == UpsellStatus::Approved {
                    requests.push(request);
                }
            }
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(request_key("pi_1"), "upsell_request:pi_1");
        assert_eq!(reservation_set_key("res-1"), "reservation:res-1:upsells");
        assert_eq!(intent_index_key("pi_1"), "upsell_intent:pi_1");
    }
}
