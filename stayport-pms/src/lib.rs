pub mod client;
pub mod error;
pub mod token;

pub use client::{PmsClient, ReservationSummary};
pub use error::PmsError;
pub use token::AccessTokenSource;

/// Connection settings for the property-management platform. Built from
/// the application config at startup.
#[derive(Debug, Clone)]
pub struct PmsConfig {
    pub api_url: String,
    pub oauth_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Manual bearer token; when present every token-cache lookup is
    /// bypassed. The workaround for the issuer's token quota.
    pub access_token_override: Option<String>,
    /// Custom-field id the portal code is written to.
    pub portal_code_field_id: String,
}
