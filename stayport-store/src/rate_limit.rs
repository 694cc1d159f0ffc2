use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::warn;

use crate::redis_repo::RedisClient;

/// A named sliding-window policy.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window_ms: i64,
    pub max_requests: u32,
}

/// Authentication attempts: 5 per minute per client address.
pub const AUTH_POLICY: RateLimitPolicy = RateLimitPolicy {
    name: "auth",
    window_ms: 60 * 1000,
    max_requests: 5,
};

/// General API traffic: 60 per minute.
pub const API_POLICY: RateLimitPolicy = RateLimitPolicy {
    name: "api",
    window_ms: 60 * 1000,
    max_requests: 60,
};

/// Sensitive operations: 3 per five minutes.
pub const STRICT_POLICY: RateLimitPolicy = RateLimitPolicy {
    name: "strict",
    window_ms: 5 * 60 * 1000,
    max_requests: 3,
};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix milliseconds at which the window opens again.
    pub reset_at: i64,
}

fn limit_key(policy: &RateLimitPolicy, identifier: &str) -> String {
    format!("ratelimit:{}:{}", policy.name, identifier)
}

/// Entries are `{timestamp_ms}-{nonce}` so that two requests landing in the
/// same millisecond still count separately; the score carries the timestamp.
fn window_member(now_ms: i64) -> String {
    let nonce: u16 = rand::thread_rng().gen();
    format!("{}-{:04x}", now_ms, nonce)
}

fn member_timestamp(member: &str) -> i64 {
    member
        .split('-')
        .next()
        .and_then(|ts| ts.parse().ok())
        .unwrap_or(0)
}

/// Sliding-window counter over a sorted set per (policy, identifier).
/// Whether an unreachable store admits or rejects is configuration
/// (`rate_limit.fail_open`), not an accident of error handling.
pub struct RateLimiter {
    redis: Arc<RedisClient>,
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(redis: Arc<RedisClient>, fail_open: bool) -> Self {
        Self { redis, fail_open }
    }

    pub async fn check(&self, identifier: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let now = Utc::now().timestamp_millis();
        match self.try_check(identifier, policy, now).await {
            Ok(decision) => decision,
            Err(err) => {
                if self.fail_open {
                    warn!(
                        "Rate limit store unavailable, admitting {} ({})",
                        identifier, err
                    );
                    RateLimitDecision {
                        allowed: true,
                        remaining: policy.max_requests,
                        reset_at: now + policy.window_ms,
                    }
                } else {
                    warn!(
                        "Rate limit store unavailable, rejecting {} ({})",
                        identifier, err
                    );
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: now + policy.window_ms,
                    }
                }
            }
        }
    }

    async fn try_check(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
        now: i64,
    ) -> Result<RateLimitDecision, redis::RedisError> {
        let key = limit_key(policy, identifier);
        let window_start = now - policy.window_ms;

        self.redis.zremrangebyscore(&key, 0, window_start).await?;

        let current = self.redis.zcard(&key).await? as u32;
        if current >= policy.max_requests {
            let reset_at = match self.redis.zrange_first(&key).await? {
                Some(oldest) => member_timestamp(&oldest) + policy.window_ms,
                None => now + policy.window_ms,
            };
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            });
        }

        self.redis.zadd(&key, &window_member(now), now).await?;
        // Expire the key just past the window to bound storage
        self.redis
            .expire(&key, policy.window_ms / 1000 + 1)
            .await?;

        Ok(RateLimitDecision {
            allowed: true,
            remaining: policy.max_requests - current - 1,
            reset_at: now + policy.window_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_carries_timestamp() {
        let member = window_member(1_736_000_000_123);
        assert_eq!(member_timestamp(&member), 1_736_000_000_123);
    }

    #[test]
    fn test_member_timestamp_tolerates_garbage() {
        assert_eq!(member_timestamp("not-a-number"), 0);
        assert_eq!(member_timestamp(""), 0);
    }

    #[test]
    fn test_key_includes_policy_name() {
        assert_eq!(
            limit_key(&AUTH_POLICY, "203.0.113.9"),
            "ratelimit:auth:203.0.113.9"
        );
    }

    #[test]
    fn test_policies() {
        assert_eq!(AUTH_POLICY.max_requests, 5);
        assert_eq!(AUTH_POLICY.window_ms, 60_000);
        assert_eq!(STRICT_POLICY.max_requests, 3);
        assert_eq!(STRICT_POLICY.window_ms, 300_000);
    }
}
