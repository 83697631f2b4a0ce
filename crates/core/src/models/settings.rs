use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_MARKET_FEED_URL: &str = "wss://ws.finnhub.io";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;
pub const DEFAULT_HISTORY_CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_HISTORY_RANGE: &str = "6M";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Largest TTL `chrono::TimeDelta` can hold in seconds.
pub const MAX_HISTORY_CACHE_TTL_SECS: u64 = i64::MAX as u64 / 1000;

/// Runtime configuration for the live-price layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the REST backend, without trailing slash.
    pub api_base_url: String,

    /// Third-party market-data socket (trade pushes).
    pub market_feed_url: String,

    /// Optional internal socket sending full `{prices: [...]}` frames.
    pub prices_feed_url: Option<String>,

    /// Market-data API token. The market feed is not opened without it.
    pub finnhub_token: Option<String>,

    /// Bearer token attached to every REST request.
    pub access_token: Option<String>,

    /// Backend id of the signed-in user.
    pub user_id: Option<i64>,

    /// Fixed delay before a dropped feed reconnects.
    pub reconnect_delay_ms: u64,

    /// Freshness window of cached historical series.
    pub history_cache_ttl_secs: u64,

    /// Range requested from the history endpoint (e.g. `"6M"`).
    pub history_range: String,

    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            market_feed_url: DEFAULT_MARKET_FEED_URL.to_string(),
            prices_feed_url: None,
            finnhub_token: None,
            access_token: None,
            user_id: None,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            history_cache_ttl_secs: DEFAULT_HISTORY_CACHE_TTL_SECS,
            history_range: DEFAULT_HISTORY_RANGE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Build settings from the process environment, loading `.env` first
    /// when one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("STOCK_API_BASE_URL") {
            settings.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = non_empty("FINNHUB_WS_URL") {
            settings.market_feed_url = url;
        }
        settings.prices_feed_url = non_empty("PRICES_WS_URL");
        settings.finnhub_token = non_empty("FINNHUB_API_KEY");
        settings.access_token = non_empty("STOCK_ACCESS_TOKEN");

        if let Some(raw) = non_empty("STOCK_USER_ID") {
            settings.user_id = Some(raw.trim().parse().map_err(|_| {
                CoreError::Config(format!("STOCK_USER_ID must be an integer, got '{raw}'"))
            })?);
        }
        if let Some(raw) = non_empty("STOCK_RECONNECT_DELAY_MS") {
            settings.reconnect_delay_ms = raw.trim().parse().map_err(|_| {
                CoreError::Config(format!(
                    "STOCK_RECONNECT_DELAY_MS must be a non-negative integer, got '{raw}'"
                ))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.api_base_url.trim().is_empty() {
            return Err(CoreError::Config("api_base_url must not be empty".into()));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(CoreError::Config("reconnect_delay_ms must be > 0".into()));
        }
        if self.history_cache_ttl_secs == 0 {
            return Err(CoreError::Config("history_cache_ttl_secs must be > 0".into()));
        }
        if self.history_cache_ttl_secs > MAX_HISTORY_CACHE_TTL_SECS {
            return Err(CoreError::Config(format!(
                "history_cache_ttl_secs must be <= {MAX_HISTORY_CACHE_TTL_SECS}"
            )));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn history_cache_ttl(&self) -> Result<chrono::Duration, CoreError> {
        i64::try_from(self.history_cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                CoreError::Config(format!(
                    "history_cache_ttl_secs out of range: {}",
                    self.history_cache_ttl_secs
                ))
            })
    }

    /// Market feed URL with the API token attached, if a token is configured.
    pub fn market_feed_endpoint(&self) -> Option<String> {
        let token = self.finnhub_token.as_deref()?;
        let sep = if self.market_feed_url.contains('?') { '&' } else { '?' };
        Some(format!("{}{sep}token={token}", self.market_feed_url))
    }
}
