use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use stayport_core::token::{CachedToken, TokenCacheStore};
use tracing::{debug, error, info};

use crate::{PmsConfig, PmsError};

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    /// Seconds; typically 86400.
    expires_in: i64,
}

/// Client-credentials token acquisition behind the injected cache seam.
/// One token per lifetime is shared across every process that can reach
/// the cache backend.
pub struct AccessTokenSource {
    http: reqwest::Client,
    config: PmsConfig,
    cache: Arc<dyn TokenCacheStore>,
}

impl AccessTokenSource {
    pub fn new(http: reqwest::Client, config: PmsConfig, cache: Arc<dyn TokenCacheStore>) -> Self {
        Self {
            http,
            config,
            cache,
        }
    }

    pub async fn bearer_token(&self) -> Result<String, PmsError> {
        // Manual override wins unconditionally
        if let Some(token) = &self.config.access_token_override {
            debug!("Using manually provided platform access token");
            return Ok(token.clone());
        }

        let now = Utc::now().timestamp_millis();
        if let Some(cached) = self.cache.get().await {
            if cached.is_fresh(now) {
                debug!("Using cached platform access token");
                return Ok(cached.access_token);
            }
        }

        info!("Requesting new platform access token");
        let response = self
            .http
            .post(&self.config.oauth_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", "open-api"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            error!("Platform token endpoint rejected the request with 429");
            return Err(PmsError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Platform token request failed: {} {}", status, body);
            return Err(PmsError::Upstream { status, body });
        }

        let grant: TokenGrant = response.json().await?;
        let token = CachedToken {
            access_token: grant.access_token,
            expires_at: now + grant.expires_in * 1000,
        };
        self.cache.put(&token).await;
        info!(
            "Got new platform access token, valid for {} seconds",
            grant.expires_in
        );

        Ok(token.access_token)
    }
}
