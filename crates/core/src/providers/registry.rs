use async_trait::async_trait;
use log::{debug, warn};

use crate::errors::CoreError;
use crate::models::history::HistoricalPoint;
use crate::models::settings::Settings;
use crate::models::symbol::Symbol;

use super::rest::RestApiClient;
use super::traits::HistoryProvider;
use super::yahoo_finance::YahooFinanceProvider;

/// Ordered list of history providers with automatic fallback.
///
/// Tries providers in registration order; the first success wins. The
/// registry is itself a [`HistoryProvider`], so the cache never knows how
/// many sources stand behind it.
pub struct HistoryProviderRegistry {
    providers: Vec<Box<dyn HistoryProvider>>,
}

impl HistoryProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Backend REST first, Yahoo Finance as fallback.
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RestApiClient::new(settings)));

        match YahooFinanceProvider::new(&settings.history_range) {
            Ok(yahoo) => registry.register(Box::new(yahoo)),
            Err(e) => warn!("Yahoo Finance fallback unavailable: {e}"),
        }

        registry
    }

    /// Register a new history provider at the lowest priority.
    pub fn register(&mut self, provider: Box<dyn HistoryProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for HistoryProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryProvider for HistoryProviderRegistry {
    fn name(&self) -> &str {
        "HistoryProviderRegistry"
    }

    async fn fetch_history(&self, symbol: &Symbol) -> Result<Vec<HistoricalPoint>, CoreError> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.fetch_history(symbol).await {
                Ok(points) => return Ok(points),
                Err(e) => {
                    debug!("{} failed for {symbol}: {e}", provider.name());
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(format!("history of {symbol}"))))
    }
}
