use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use crate::redis_repo::RedisClient;

pub const CODE_LENGTH: usize = 6;
/// I and O are excluded to avoid confusion with 1 and 0.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const MAX_GENERATION_ATTEMPTS: usize = 10;

fn code_key(code: &str) -> String {
    format!("portal_code:{}", code.to_uppercase())
}

fn reservation_key(reservation_id: &str) -> String {
    format!("reservation:{}:portal_code", reservation_id)
}

/// Bidirectional code <-> reservation mappings. Codes are permanent (no
/// TTL) and immutable once assigned; uniqueness is probabilistic and
/// enforced by read-before-write, which is acceptable at this volume.
pub struct PortalCodeStore {
    redis: Arc<RedisClient>,
}

impl PortalCodeStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    /// A random 6-letter code from the restricted alphabet.
    pub fn random_code() -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Two base-36 characters derived from a millisecond timestamp, used to
    /// force uniqueness when random generation keeps colliding.
    pub fn timestamp_suffix(now_ms: i64) -> String {
        let encoded = to_base36(now_ms.unsigned_abs());
        let tail = encoded.len().saturating_sub(2);
        encoded[tail..].to_uppercase()
    }

    pub async fn code_exists(&self, code: &str) -> bool {
        match self.redis.get(&code_key(code)).await {
            Ok(existing) => existing.is_some(),
            Err(err) => {
                error!("Portal code existence check failed: {}", err);
                false
            }
        }
    }

    /// Generate a code that is not currently assigned. Retries on collision;
    /// after exhausting the retries, appends a timestamp suffix so the call
    /// always terminates with a usable (if longer) code.
    pub async fn generate_unique_code(&self) -> String {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let code = Self::random_code();
            if !self.code_exists(&code).await {
                return code;
            }
        }

        let fallback = format!(
            "{}{}",
            Self::random_code(),
            Self::timestamp_suffix(Utc::now().timestamp_millis())
        );
        warn!("Portal code generation exhausted retries, using suffixed code");
        fallback
    }

    /// Write both directional mappings. Last writer wins; there is no
    /// transactional guard, the admin and webhook paths check before writing.
    pub async fn store_code(&self, reservation_id: &str, code: &str) -> bool {
        let code = code.to_uppercase();

        if let Err(err) = self.redis.set(&code_key(&code), reservation_id).await {
            error!("Failed to store portal code {}: {}", code, err);
            return false;
        }
        if let Err(err) = self.redis.set(&reservation_key(reservation_id), &code).await {
            error!(
                "Failed to store reverse mapping for reservation {}: {}",
                reservation_id, err
            );
            return false;
        }

        info!(
            "Stored portal code {} for reservation {}",
            code, reservation_id
        );
        true
    }

    /// Resolve a code to its reservation. Repairs a missing reverse mapping
    /// when the forward one exists; a partial dual write reads as "needs
    /// repair", not "absent".
    pub async fn lookup_by_code(&self, code: &str) -> Option<String> {
        let reservation_id = match self.redis.get(&code_key(code)).await {
            Ok(found) => found?,
            Err(err) => {
                error!("Portal code lookup failed: {}", err);
                return None;
            }
        };

        match self.redis.get(&reservation_key(&reservation_id)).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(
                    "Reverse mapping missing for reservation {}, repairing",
                    reservation_id
                );
                // NX so a concurrent full write is never clobbered
                let _ = self
                    .redis
                    .set_nx(&reservation_key(&reservation_id), &code.to_uppercase())
                    .await;
            }
            Err(err) => error!("Reverse mapping check failed: {}", err),
        }

        Some(reservation_id)
    }

    pub async fn lookup_by_reservation(&self, reservation_id: &str) -> Option<String> {
        match self.redis.get(&reservation_key(reservation_id)).await {
            Ok(code) => code,
            Err(err) => {
                error!("Reservation portal code lookup failed: {}", err);
                None
            }
        }
    }

    pub async fn reservation_has_code(&self, reservation_id: &str) -> bool {
        self.lookup_by_reservation(reservation_id).await.is_some()
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_shape() {
        for _ in 0..100 {
            let code = PortalCodeStore::random_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('I'));
            assert!(!code.contains('O'));
        }
    }

    #[test]
    fn test_timestamp_suffix_is_two_chars() {
        let suffix = PortalCodeStore::timestamp_suffix(1_736_000_000_000);
        assert_eq!(suffix.len(), 2);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_base36_round_numbers() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_key_formats_normalize_case() {
        assert_eq!(code_key("abcdef"), "portal_code:ABCDEF");
        assert_eq!(reservation_key("res-1"), "reservation:res-1:portal_code");
    }
}
