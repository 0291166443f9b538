//! Client configuration
//!
//! Credentials and endpoint locations for the Terna transparency API, either
//! built in code or loaded from `TERNA_*` environment variables.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, TernaError};

/// Data API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.terna.it/";

/// OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://api.terna.it/transparency/oauth/accessToken";

/// Longest date span sent in a single request
pub const DEFAULT_MAX_SPAN_DAYS: u32 = 60;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`crate::TernaClient`]
#[derive(Clone)]
pub struct ClientConfig {
    /// Data API base URL, paths are appended to it
    pub base_url: String,

    /// OAuth2 token endpoint URL
    pub token_url: String,

    /// API key (OAuth2 client id)
    pub api_key: String,

    /// API secret (OAuth2 client secret, sensitive!)
    pub api_secret: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Date ranges longer than this are split into several requests
    pub max_span_days: u32,
}

impl ClientConfig {
    /// Create a configuration with default URLs
    ///
    /// Fails when the key or secret is empty.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.trim().is_empty() {
            return Err(TernaError::Config("API key cannot be empty".to_string()));
        }
        if api_secret.trim().is_empty() {
            return Err(TernaError::Config("API secret cannot be empty".to_string()));
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_key,
            api_secret,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
        })
    }

    /// Load configuration from the environment
    ///
    /// Required: `TERNA_API_KEY`, `TERNA_API_SECRET`.
    /// Optional: `TERNA_BASE_URL`, `TERNA_TOKEN_URL`, `TERNA_TIMEOUT_SECS`,
    /// `TERNA_MAX_SPAN_DAYS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("TERNA_API_KEY").ok_or_else(|| {
            TernaError::Config("TERNA_API_KEY environment variable not set".to_string())
        })?;
        let api_secret = lookup("TERNA_API_SECRET").ok_or_else(|| {
            TernaError::Config("TERNA_API_SECRET environment variable not set".to_string())
        })?;

        let mut config = Self::new(api_key, api_secret)?;

        if let Some(base_url) = lookup("TERNA_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(token_url) = lookup("TERNA_TOKEN_URL") {
            config.token_url = token_url;
        }
        if let Some(raw) = lookup("TERNA_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                TernaError::Config(format!("TERNA_TIMEOUT_SECS is not a number: '{}'", raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("TERNA_MAX_SPAN_DAYS") {
            let days = raw.trim().parse::<u32>().map_err(|_| {
                TernaError::Config(format!("TERNA_MAX_SPAN_DAYS is not a number: '{}'", raw))
            })?;
            config = config.with_max_span_days(days)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject blank URLs
    ///
    /// `with_base_url`/`with_token_url` accept anything; this runs again
    /// when a client is built.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(TernaError::Config("base URL cannot be empty".to_string()));
        }
        if self.token_url.trim().is_empty() {
            return Err(TernaError::Config("token URL cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the chunk span; zero is rejected
    pub fn with_max_span_days(mut self, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(TernaError::Config(
                "max span must be at least one day".to_string(),
            ));
        }
        self.max_span_days = days;
        Ok(self)
    }
}

/// Show the first four characters of a credential
pub(crate) fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}***", visible)
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .field("timeout", &self.timeout)
            .field("max_span_days", &self.max_span_days)
            .finish()
    }
}
