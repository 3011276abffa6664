//! Gmail OAuth2 access tokens
//!
//! Exchanges a long-lived refresh token for short-lived access tokens and
//! caches the current one in memory. Obtaining the refresh token in the
//! first place (the consent flow) happens outside this program.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Mutex;

use crate::config::GmailCredentials;

/// OAuth2 token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<i64>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Seconds before expiry at which a cached token is considered stale
    const EXPIRY_BUFFER_SECS: i64 = 300;

    pub fn new(credentials: &GmailCredentials) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            refresh_token: credentials.refresh_token.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing it when missing or about to expire
    pub fn get_access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow::anyhow!("Gmail token cache poisoned"))?;

        if let Some(token) = cached.as_ref()
            && is_fresh(token.expires_at, chrono::Utc::now().timestamp())
        {
            return Ok(token.access_token.clone());
        }

        let response = self.refresh_access_token()?;
        let token = CachedToken {
            access_token: response.access_token,
            expires_at: response
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Exchange the refresh token for a new access token
    fn refresh_access_token(&self) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh Gmail access token")?;

        response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")
    }

    /// Drop the cached access token so the next call refreshes
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}

/// A token without an expiry is only trusted once, so treat it as stale
fn is_fresh(expires_at: Option<i64>, now: i64) -> bool {
    expires_at.is_some_and(|at| at > now + GmailAuth::EXPIRY_BUFFER_SECS)
}
