use serde::{Deserialize, Serialize};

/// Server-side session payload. The browser only ever holds the opaque
/// session id; this structure never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub reservation_id: String,
    pub confirmation_code: String,
    pub guest_name: String,
    pub listing_id: String,
    #[serde(default)]
    pub is_demo: bool,
    /// Unix milliseconds at creation.
    pub created_at: i64,
}
