use std::net::SocketAddr;
use std::sync::Arc;

use stayport_api::{app, catalog, notifications::Notifier, state::{AppState, CookieConfig, SecurityConfig}, stripe::StripeClient};
use stayport_core::token::TokenCacheStore;
use stayport_pms::{PmsClient, PmsConfig};
use stayport_store::portal_codes::PortalCodeStore;
use stayport_store::rate_limit::RateLimiter;
use stayport_store::sessions::SessionStore;
use stayport_store::token_cache::{MemoryTokenCache, RedisTokenCache};
use stayport_store::upsell_requests::UpsellLedger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stayport_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = stayport_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Stayport API on port {}", config.server.port);

    // Redis Connection
    let redis = Arc::new(
        stayport_store::RedisClient::new(&config.redis.url)
            .await
            .expect("Failed to connect to Redis"),
    );

    // Token cache: shared through the store when one is configured, so the
    // strictly rate-limited token endpoint is hit once per token lifetime
    // across every instance
    let token_cache: Arc<dyn TokenCacheStore> = if config.redis.url.is_empty() {
        Arc::new(MemoryTokenCache::new())
    } else {
        Arc::new(RedisTokenCache::new(redis.clone()))
    };

    let pms = Arc::new(PmsClient::new(
        PmsConfig {
            api_url: config.pms.api_url.clone(),
            oauth_url: config.pms.oauth_url.clone(),
            client_id: config.pms.client_id.clone(),
            client_secret: config.pms.client_secret.clone(),
            access_token_override: config.pms.access_token.clone(),
            portal_code_field_id: config.pms.portal_code_field_id.clone(),
        },
        token_cache,
    ));

    let http = reqwest::Client::new();
    let stripe = Arc::new(StripeClient::new(
        http.clone(),
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.api_url.clone(),
        config.notifications.app_url.clone(),
    ));
    let notifier = Arc::new(Notifier::new(http, config.notifications.clone()));

    let app_state = AppState {
        redis: redis.clone(),
        sessions: Arc::new(SessionStore::new(
            redis.clone(),
            config.portal.session_ttl_seconds,
        )),
        portal_codes: Arc::new(PortalCodeStore::new(redis.clone())),
        ledger: Arc::new(UpsellLedger::new(redis.clone())),
        limiter: Arc::new(RateLimiter::new(redis.clone(), config.rate_limit.fail_open)),
        pms,
        stripe,
        notifier,
        catalog: Arc::new(catalog::build(&config.portal.pool_listing_ids)),
        security: SecurityConfig {
            admin_secret: config.security.admin_secret.clone(),
            cron_secret: config.security.cron_secret.clone(),
            pms_webhook_secret: config.security.pms_webhook_secret.clone(),
        },
        cookies: CookieConfig {
            secure: config.portal.secure_cookies,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
