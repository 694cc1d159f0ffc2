use std::sync::Arc;

use stayport_core::upsell::Upsell;
use stayport_pms::PmsClient;
use stayport_store::portal_codes::PortalCodeStore;
use stayport_store::rate_limit::RateLimiter;
use stayport_store::sessions::SessionStore;
use stayport_store::upsell_requests::UpsellLedger;
use stayport_store::RedisClient;

use crate::notifications::Notifier;
use crate::stripe::StripeClient;

#[derive(Clone)]
pub struct SecurityConfig {
    pub admin_secret: Option<String>,
    pub cron_secret: Option<String>,
    pub pms_webhook_secret: Option<String>,
}

#[derive(Clone)]
pub struct CookieConfig {
    pub secure: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub redis: Arc<RedisClient>,
    pub sessions: Arc<SessionStore>,
    pub portal_codes: Arc<PortalCodeStore>,
    pub ledger: Arc<UpsellLedger>,
    pub limiter: Arc<RateLimiter>,
    pub pms: Arc<PmsClient>,
    pub stripe: Arc<StripeClient>,
    pub notifier: Arc<Notifier>,
    pub catalog: Arc<Vec<Upsell>>,
    pub security: SecurityConfig,
    pub cookies: CookieConfig,
}
