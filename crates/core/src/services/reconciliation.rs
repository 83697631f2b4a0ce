use chrono::Duration;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::errors::CoreError;
use crate::models::quote::LivePriceRecord;
use crate::models::symbol::Symbol;
use crate::providers::traits::{HistoryProvider, QuoteProvider};
use crate::services::history_cache::{FetchReport, HistoricalSeriesCache};
use crate::services::live_price_store::LivePriceStore;
use crate::services::symbol_registry::SymbolRegistry;
use crate::stream::feed::{ConnectionStatus, FeedProtocol};
use crate::stream::messages::StreamEvent;

/// Result of one reconcile pass after the symbol set changed.
#[derive(Debug)]
pub struct ReconcileReport {
    /// Number of live records after the snapshot, or why it failed.
    pub snapshot: Result<usize, CoreError>,
    pub history: FetchReport,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.snapshot.is_ok() && self.history.is_success()
    }
}

/// Owns the registry, the live store and the history cache, and keeps them
/// consistent:
///
/// - A registry change triggers a batch snapshot and a non-forced history
///   fetch for the new set. Feeds follow the change through the registry's
///   watch channel.
/// - Feed output arrives as [`StreamEvent`]s on a channel and is applied
///   here, so the store has a single writer.
/// - Snapshots are applied against the registry as it is when the response
///   lands, never against a list captured earlier.
pub struct ReconciliationDriver {
    registry: SymbolRegistry,
    store: LivePriceStore,
    cache: HistoricalSeriesCache,
    quotes: Arc<dyn QuoteProvider>,
    history: Arc<dyn HistoryProvider>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events_rx: mpsc::UnboundedReceiver<StreamEvent>,
    status: HashMap<FeedProtocol, ConnectionStatus>,
}

impl ReconciliationDriver {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        history: Arc<dyn HistoryProvider>,
        history_ttl: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            registry: SymbolRegistry::new(),
            store: LivePriceStore::new(),
            cache: HistoricalSeriesCache::new(history_ttl),
            quotes,
            history,
            events_tx,
            events_rx,
            status: HashMap::new(),
        }
    }

    // ── Registry ────────────────────────────────────────────────────

    /// Add a symbol and reconcile. `None` when it was already tracked.
    pub async fn add_symbol(&mut self, symbol: Symbol) -> Option<ReconcileReport> {
        if !self.registry.add(symbol) {
            return None;
        }
        Some(self.reconcile().await)
    }

    /// Remove a symbol and reconcile. `None` when it was not tracked.
    pub async fn remove_symbol(&mut self, symbol: &Symbol) -> Option<ReconcileReport> {
        if !self.registry.remove(symbol) {
            return None;
        }
        Some(self.reconcile().await)
    }

    /// Replace the whole set (startup load of persisted interests).
    /// Always reconciles, even if the set is unchanged, so a reload also
    /// refreshes prices.
    pub async fn set_symbols(
        &mut self,
        symbols: impl IntoIterator<Item = Symbol>,
    ) -> ReconcileReport {
        if !self.registry.replace_all(symbols) {
            debug!("Symbol set unchanged on reload");
        }
        self.reconcile().await
    }

    /// Seed the set and the store from rows already fetched (the interest
    /// list doubles as a price snapshot), then fetch history. No quote
    /// request is made.
    pub async fn load_snapshot(&mut self, rows: Vec<LivePriceRecord>) -> ReconcileReport {
        let symbols: Vec<Symbol> = rows.iter().map(|r| r.symbol.clone()).collect();
        if !self.registry.replace_all(symbols) {
            debug!("Symbol set unchanged on reload");
        }
        let symbols = self.registry.symbols().to_vec();
        self.store.apply_snapshot(rows, &symbols);
        self.cache.retain(&symbols);

        let history = self
            .cache
            .fetch(self.history.as_ref(), &symbols, false)
            .await;
        ReconcileReport {
            snapshot: Ok(self.store.len()),
            history,
        }
    }

    /// Snapshot refresh and history fetch for the current set, in parallel.
    pub async fn reconcile(&mut self) -> ReconcileReport {
        let symbols = self.registry.symbols().to_vec();
        info!("Reconciling {} symbols", symbols.len());
        self.cache.retain(&symbols);

        let (snapshot, history) = tokio::join!(
            self.store.snapshot_refresh(self.quotes.as_ref(), &symbols),
            self.cache.fetch(self.history.as_ref(), &symbols, false),
        );
        ReconcileReport { snapshot, history }
    }

    /// Retry the batch snapshot alone (after a failed refresh).
    pub async fn refresh_prices(&mut self) -> Result<usize, CoreError> {
        let symbols = self.registry.symbols().to_vec();
        self.store
            .snapshot_refresh(self.quotes.as_ref(), &symbols)
            .await
    }

    pub async fn fetch_history(&mut self, force_refresh: bool) -> FetchReport {
        let symbols = self.registry.symbols().to_vec();
        self.cache
            .fetch(self.history.as_ref(), &symbols, force_refresh)
            .await
    }

    // ── Stream events ───────────────────────────────────────────────

    /// Sender that feed tasks publish their events on.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<StreamEvent> {
        self.events_tx.clone()
    }

    /// Receiver that always holds the current symbol set.
    pub fn symbol_watch(&self) -> watch::Receiver<Vec<Symbol>> {
        self.registry.subscribe()
    }

    /// Apply one event to the store. Returns how many records it touched.
    pub fn handle_event(&mut self, event: &StreamEvent) -> usize {
        match event {
            StreamEvent::Trades(updates) => self.store.apply_push(updates),
            StreamEvent::Prices(records) => self.store.apply_price_frame(records),
            StreamEvent::Status { protocol, status } => {
                info!("{protocol:?} feed {status:?}");
                self.status.insert(*protocol, *status);
                0
            }
        }
    }

    /// Apply every event already queued, in arrival order, without waiting.
    /// Returns the number of events applied.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(&event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next event, apply it, and hand it back.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.events_rx.recv().await?;
        self.handle_event(&event);
        Some(event)
    }

    /// Latest reported status of a feed; `Disconnected` if it never reported.
    pub fn connection_status(&self, protocol: FeedProtocol) -> ConnectionStatus {
        self.status
            .get(&protocol)
            .copied()
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &LivePriceStore {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &HistoricalSeriesCache {
        &self.cache
    }
}

impl std::fmt::Debug for ReconciliationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationDriver")
            .field("symbols", &self.registry.len())
            .field("records", &self.store.len())
            .field("cached_series", &self.cache.len())
            .field("quotes", &self.quotes.name())
            .field("history", &self.history.name())
            .field("status", &self.status)
            .finish()
    }
}
