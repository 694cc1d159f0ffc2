use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub pms: PmsSettings,
    pub stripe: StripeSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub portal: PortalSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Property-management platform credentials and endpoints.
#[derive(Debug, Deserialize, Clone)]
pub struct PmsSettings {
    #[serde(default = "default_pms_api_url")]
    pub api_url: String,
    #[serde(default = "default_pms_oauth_url")]
    pub oauth_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Manual bearer token override. Bypasses the token cache entirely;
    /// the escape hatch for the issuer's 5-tokens-per-24h quota.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Custom-field id the portal code is mirrored into.
    pub portal_code_field_id: String,
}

fn default_pms_api_url() -> String {
    "https://open-api.guesty.com/v1".to_string()
}

fn default_pms_oauth_url() -> String {
    "https://open-api.guesty.com/oauth2/token".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_stripe_api_url")]
    pub api_url: String,
}

fn default_stripe_api_url() -> String {
    "https://api.stripe.com/v1".to_string()
}

/// Bearer secrets for the maintenance surfaces. Unset means the surface
/// rejects every request.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecuritySettings {
    #[serde(default)]
    pub admin_secret: Option<String>,
    #[serde(default)]
    pub cron_secret: Option<String>,
    #[serde(default)]
    pub pms_webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationSettings {
    #[serde(default = "default_email_api_url")]
    pub email_api_url: String,
    #[serde(default)]
    pub email_api_key: Option<String>,
    #[serde(default = "default_email_from")]
    pub email_from: String,
    #[serde(default)]
    pub email_to: Option<String>,
    #[serde(default)]
    pub chat_webhook_url: Option<String>,
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_api_url: default_email_api_url(),
            email_api_key: None,
            email_from: default_email_from(),
            email_to: None,
            chat_webhook_url: None,
            app_url: default_app_url(),
        }
    }
}

fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_email_from() -> String {
    "Stayport <notifications@stayport.example>".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    /// Admit requests when the store cannot be reached. This gate protects
    /// an auth endpoint, not a billing boundary.
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            fail_open: default_fail_open(),
        }
    }
}

fn default_fail_open() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalSettings {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default)]
    pub secure_cookies: bool,
    /// Listings that have a pool; gates the pool-heating catalog entry.
    #[serde(default)]
    pub pool_listing_ids: Vec<String>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl(),
            secure_cookies: false,
            pool_listing_ids: Vec::new(),
        }
    }
}

fn default_session_ttl() -> u64 {
    60 * 60 * 24
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of STAYPORT)
            // Eg.. `STAYPORT_SERVER__PORT=8080` would set the server port
            .add_source(config::Environment::with_prefix("STAYPORT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
