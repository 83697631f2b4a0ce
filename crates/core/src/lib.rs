pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod stream;

use futures::future::join_all;
use log::{info, warn};
use models::{
    alert::Alert,
    history::{HistoricalPoint, Timeframe},
    portfolio::Portfolio,
    quote::LivePriceRecord,
    settings::Settings,
    symbol::Symbol,
    valuation::{PortfolioOverview, PortfolioValuation},
};
use providers::{
    registry::HistoryProviderRegistry,
    rest::RestApiClient,
    traits::{AlertProvider, HistoryProvider, InterestProvider, QuoteProvider},
};
use services::{
    alert_service::AlertService,
    history_cache::{FetchReport, HistoricalSeriesCache},
    live_price_store::LivePriceStore,
    reconciliation::{ReconcileReport, ReconciliationDriver},
    symbol_registry::SymbolRegistry,
    valuation_service::ValuationService,
};
use std::collections::HashMap;
use std::sync::Arc;
use stream::{
    feed::{spawn_feed, ConnectionStatus, FeedHandle, FeedProtocol},
    messages::StreamEvent,
    transport::{FeedTransport, WsTransport},
};

use errors::CoreError;

/// The remote collaborators behind a [`StockLive`].
pub struct Providers {
    pub quotes: Arc<dyn QuoteProvider>,
    pub history: Arc<dyn HistoryProvider>,
    pub interests: Arc<dyn InterestProvider>,
    pub alerts: Arc<dyn AlertProvider>,
}

impl Providers {
    /// REST backend for everything, with Yahoo Finance as history fallback.
    pub fn from_settings(settings: &Settings) -> Self {
        let api = Arc::new(RestApiClient::new(settings));
        Self {
            quotes: api.clone(),
            history: Arc::new(HistoryProviderRegistry::new_with_defaults(settings)),
            interests: api.clone(),
            alerts: api,
        }
    }
}

/// Main entry point of the live-price core.
/// Holds the symbol set, the live store, the history cache and the running
/// feeds, and exposes the derived valuations.
///
/// Feed tasks queue their output; the store only changes when that queue is
/// applied. Reads such as [`records`](Self::records),
/// [`valuate`](Self::valuate) and [`overview`](Self::overview) reflect the
/// events applied so far, so call [`process_events`](Self::process_events)
/// before reading, or drive [`next_event`](Self::next_event) in a loop.
#[must_use]
pub struct StockLive {
    settings: Settings,
    driver: ReconciliationDriver,
    interests: Arc<dyn InterestProvider>,
    alerts: Arc<dyn AlertProvider>,
    valuation_service: ValuationService,
    alert_service: AlertService,
    feeds: Vec<FeedHandle>,
}

impl std::fmt::Debug for StockLive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLive")
            .field("symbols", &self.driver.registry().symbols())
            .field("records", &self.driver.store().len())
            .field("cached_series", &self.driver.cache().len())
            .field("feeds", &self.feeds.iter().map(FeedHandle::protocol).collect::<Vec<_>>())
            .finish()
    }
}

impl StockLive {
    /// Build against the REST backend described by `settings`.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        let providers = Providers::from_settings(&settings);
        Self::with_providers(settings, providers)
    }

    /// Build from `.env` / process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::new(Settings::from_env()?)
    }

    /// Build with explicit providers (alternate backends, tests).
    pub fn with_providers(settings: Settings, providers: Providers) -> Result<Self, CoreError> {
        settings.validate()?;
        let driver = ReconciliationDriver::new(
            providers.quotes,
            providers.history,
            settings.history_cache_ttl()?,
        );
        Ok(Self {
            settings,
            driver,
            interests: providers.interests,
            alerts: providers.alerts,
            valuation_service: ValuationService::new(),
            alert_service: AlertService::new(),
            feeds: Vec::new(),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn require_user(&self) -> Result<i64, CoreError> {
        self.settings
            .user_id
            .ok_or_else(|| CoreError::ValidationError("No signed-in user (user_id not set)".into()))
    }

    // ── Interests ───────────────────────────────────────────────────

    /// Load the user's persisted interest list into the registry and the
    /// store, then fetch history. The interest rows are the price snapshot,
    /// so this makes a single batch request. Call before
    /// [`start_feeds`](Self::start_feeds) so the market feed has its initial
    /// subscribe list.
    pub async fn load_interests(&mut self) -> Result<ReconcileReport, CoreError> {
        let user_id = self.require_user()?;
        let rows = self.interests.list_interests(user_id).await?;
        info!("Loaded {} interests for user {user_id}", rows.len());
        Ok(self.driver.load_snapshot(rows).await)
    }

    /// Register interest in `symbol` on the server, then track it locally.
    /// Returns `None` (and makes no request) if it is already tracked.
    pub async fn add_symbol(&mut self, symbol: &str) -> Result<Option<ReconcileReport>, CoreError> {
        let symbol = Symbol::new(symbol)?;
        if self.driver.registry().contains(&symbol) {
            return Ok(None);
        }
        let user_id = self.require_user()?;
        self.interests.add_interest(user_id, &symbol).await?;
        Ok(self.driver.add_symbol(symbol).await)
    }

    /// Remove interest in `symbol` on the server, then stop tracking it.
    /// Returns `None` (and makes no request) if it is not tracked.
    pub async fn remove_symbol(&mut self, symbol: &str) -> Result<Option<ReconcileReport>, CoreError> {
        let symbol = Symbol::new(symbol)?;
        if !self.driver.registry().contains(&symbol) {
            return Ok(None);
        }
        let user_id = self.require_user()?;
        self.interests.remove_interest(user_id, &symbol).await?;
        Ok(self.driver.remove_symbol(&symbol).await)
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        self.driver.registry().symbols()
    }

    #[must_use]
    pub fn registry(&self) -> &SymbolRegistry {
        self.driver.registry()
    }

    // ── Live prices ─────────────────────────────────────────────────

    /// Retry the batch snapshot. On failure the previous records stay.
    pub async fn refresh_prices(&mut self) -> Result<usize, CoreError> {
        self.driver.refresh_prices().await
    }

    #[must_use]
    pub fn records(&self) -> &[LivePriceRecord] {
        self.driver.store().records()
    }

    #[must_use]
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.driver.store().price_of(symbol)
    }

    #[must_use]
    pub fn store(&self) -> &LivePriceStore {
        self.driver.store()
    }

    // ── History ─────────────────────────────────────────────────────

    /// Fetch series for every tracked symbol that is stale or missing
    /// (all of them when `force_refresh`).
    pub async fn fetch_history(&mut self, force_refresh: bool) -> FetchReport {
        self.driver.fetch_history(force_refresh).await
    }

    /// Cached series cut to `timeframe`. No network access.
    #[must_use]
    pub fn filtered_history(
        &self,
        symbols: &[Symbol],
        timeframe: Timeframe,
    ) -> HashMap<Symbol, Vec<HistoricalPoint>> {
        self.driver.cache().get_filtered(symbols, timeframe)
    }

    #[must_use]
    pub fn history_cache(&self) -> &HistoricalSeriesCache {
        self.driver.cache()
    }

    // ── Valuation ───────────────────────────────────────────────────

    /// Value `portfolio` against the latest live prices.
    #[must_use]
    pub fn valuate(&self, portfolio: &Portfolio) -> PortfolioValuation {
        self.valuation_service.valuate(portfolio, self.records())
    }

    #[must_use]
    pub fn overview(&self, portfolios: &[Portfolio]) -> PortfolioOverview {
        self.valuation_service.overview(portfolios, self.records())
    }

    // ── Alerts ──────────────────────────────────────────────────────

    /// Trigger every armed alert whose target the live price has crossed.
    /// Returns the alerts the server confirmed; ids whose trigger request
    /// failed are released so the next check retries them.
    pub async fn check_alerts(&mut self, alerts: &[Alert]) -> Vec<Alert> {
        let crossed = self.alert_service.detect_crossings(alerts, self.driver.store().records());
        if crossed.is_empty() {
            return Vec::new();
        }

        let provider = self.alerts.as_ref();
        let results = join_all(crossed.into_iter().map(|id| async move {
            (id, provider.trigger_alert(id).await)
        }))
        .await;

        let mut triggered = Vec::new();
        for (id, result) in results {
            match result {
                Ok(alert) => {
                    info!("Alert {id} triggered for {}", alert.symbol);
                    triggered.push(alert);
                }
                Err(e) => {
                    warn!("Failed to trigger alert {id}: {e}");
                    self.alert_service.release(id);
                }
            }
        }
        triggered
    }

    // ── Live feeds ──────────────────────────────────────────────────

    /// Open the market feed, plus the internal prices feed when one is
    /// configured. Requires a market-data token.
    pub fn start_feeds(&mut self) -> Result<(), CoreError> {
        let endpoint = self.settings.market_feed_endpoint().ok_or_else(|| {
            CoreError::Config("FINNHUB_API_KEY is required for the market feed".into())
        })?;
        self.start_feed_with(Arc::new(WsTransport::new(endpoint)), FeedProtocol::Market)?;

        if let Some(url) = self.settings.prices_feed_url.clone() {
            self.start_feed_with(Arc::new(WsTransport::new(url)), FeedProtocol::Prices)?;
        }
        Ok(())
    }

    /// Open a feed over an explicit transport. One feed per protocol.
    pub fn start_feed_with(
        &mut self,
        transport: Arc<dyn FeedTransport>,
        protocol: FeedProtocol,
    ) -> Result<(), CoreError> {
        if self.feeds.iter().any(|f| f.protocol() == protocol) {
            return Err(CoreError::ValidationError(format!(
                "{protocol:?} feed is already running"
            )));
        }
        let handle = spawn_feed(
            transport,
            protocol,
            self.settings.reconnect_delay(),
            self.driver.symbol_watch(),
            self.driver.event_sender(),
        );
        self.feeds.push(handle);
        Ok(())
    }

    /// Apply every queued feed event to the store without waiting.
    pub fn process_events(&mut self) -> usize {
        self.driver.drain_events()
    }

    /// Wait for the next feed event and apply it.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.driver.next_event().await
    }

    #[must_use]
    pub fn connection_status(&self, protocol: FeedProtocol) -> ConnectionStatus {
        self.driver.connection_status(protocol)
    }

    /// Close every feed socket and wait for the tasks to exit, then apply
    /// whatever they delivered before closing.
    pub async fn shutdown(&mut self) {
        for handle in self.feeds.drain(..) {
            handle.shutdown().await;
        }
        self.driver.drain_events();
    }
}
