//! OAuth2 token manager for the Terna API
//!
//! Implements the OAuth2 client credentials flow with token caching.
//!
//! # Features
//! - Thread-safe token caching with Arc<Mutex<>>
//! - Tokens are refreshed 5 seconds before they expire
//! - Form-urlencoded token request (reqwest handles the encoding)
//!
//! # Example
//! ```no_run
//! use terna_transparency::oauth2::{OAuth2Config, OAuth2Manager};
//!
//! let config = OAuth2Config {
//!     token_url: "https://api.terna.it/transparency/oauth/accessToken".to_string(),
//!     client_id: "your_api_key".to_string(),
//!     client_secret: "your_api_secret".to_string(),
//! };
//!
//! let manager = OAuth2Manager::new(config, reqwest::blocking::Client::new());
//! let token = manager.get_token()?;
//! # Ok::<(), terna_transparency::OAuth2Error>(())
//! ```

use std::sync::{Arc, Mutex};

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::mask;
use crate::error::OAuth2Error;

/// Refresh this many seconds before the token actually expires
const REFRESH_BUFFER_SECONDS: i64 = 5;

/// OAuth2 configuration
#[derive(Clone)]
pub struct OAuth2Config {
    /// Token endpoint URL
    ///
    /// Example: `https://api.terna.it/transparency/oauth/accessToken`
    pub token_url: String,

    /// OAuth2 client ID (the Terna API key)
    pub client_id: String,

    /// OAuth2 client secret (sensitive!)
    pub client_secret: String,
}

impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("token_url", &self.token_url)
            .field("client_id", &mask(&self.client_id))
            .field("client_secret", &mask(&self.client_secret))
            .finish()
    }
}

/// Cached access token with expiration
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,

    /// Unix timestamp when token expires (seconds since epoch)
    expires_at: i64,
}

impl CachedToken {
    fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at.saturating_sub(REFRESH_BUFFER_SECONDS)
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Token response from the Terna token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,

    /// Token lifetime in seconds
    expires_in: u64,

    #[serde(default)]
    token_type: String,

    #[serde(default)]
    scope: String,
}

/// OAuth2 token manager with caching
///
/// Thread-safe implementation using Arc<Mutex<>> for concurrent access
#[derive(Debug)]
pub struct OAuth2Manager {
    config: OAuth2Config,
    http: Client,
    cached_token: Arc<Mutex<Option<CachedToken>>>,
}

impl OAuth2Manager {
    /// Create new OAuth2 manager sharing the given HTTP client
    pub fn new(config: OAuth2Config, http: Client) -> Self {
        Self {
            config,
            http,
            cached_token: Arc::new(Mutex::new(None)),
        }
    }

    /// Get valid access token (from cache or fetch new)
    ///
    /// Returns the cached token while it is still valid, otherwise fetches
    /// a new one and caches it.
    pub fn get_token(&self) -> Result<String, OAuth2Error> {
        let mut cache = self
            .cached_token
            .lock()
            .map_err(|e| OAuth2Error::FetchFailed {
                status: 0,
                body: format!("Token cache mutex poisoned: {}", e),
            })?;

        if let Some(ref token) = *cache {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = self.fetch_token()?;
        *cache = Some(new_token.clone());

        Ok(new_token.access_token)
    }

    /// Fetch new access token from the token endpoint
    fn fetch_token(&self) -> Result<CachedToken, OAuth2Error> {
        debug!(token_url = %self.config.token_url, "requesting access token");

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .map_err(|err| OAuth2Error::FetchFailed {
                status: 0,
                body: err.to_string(),
            })?;

        let status = response.status();
        let body = response.text().map_err(|err| OAuth2Error::FetchFailed {
            status: status.as_u16(),
            body: err.to_string(),
        })?;

        if status != StatusCode::OK {
            return match status {
                StatusCode::UNAUTHORIZED => Err(OAuth2Error::InvalidCredentials),
                _ => Err(OAuth2Error::FetchFailed {
                    status: status.as_u16(),
                    body,
                }),
            };
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            OAuth2Error::InvalidTokenResponse(format!("Failed to parse token response: {}", err))
        })?;

        if token_response.access_token.is_empty() {
            return Err(OAuth2Error::InvalidTokenResponse(
                "access_token is empty".to_string(),
            ));
        }

        if token_response.expires_in == 0 {
            return Err(OAuth2Error::InvalidTokenResponse(
                "expires_in is 0".to_string(),
            ));
        }

        debug!(
            expires_in = token_response.expires_in,
            token_type = %token_response.token_type,
            "access token received"
        );

        let expires_in = i64::try_from(token_response.expires_in).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Clear cached token (force re-fetch on next get_token call)
    ///
    /// Used when a data endpoint answers 401.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cached_token.lock() {
            *cache = None;
        }
    }

    /// True when the next `get_token` call will hit the token endpoint
    pub fn is_near_expiry(&self) -> bool {
        match self.cached_token.lock() {
            Ok(cache) => match cache.as_ref() {
                Some(token) => token.is_expired(),
                None => true,
            },
            Err(_) => true,
        }
    }
}
