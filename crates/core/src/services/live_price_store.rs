use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::quote::{LivePriceRecord, PushUpdate};
use crate::models::symbol::Symbol;
use crate::providers::traits::QuoteProvider;

/// One authoritative live price record per interested symbol.
///
/// Two writers feed it:
/// - **Snapshot** (`snapshot_refresh` / `apply_snapshot`): rebuilds the whole
///   collection from the current symbol set. The only path that changes its
///   length or order.
/// - **Push** (`apply_push` / `apply_price_frame`): mutates fields of records
///   matched by symbol. Never inserts, never removes.
#[derive(Debug, Default)]
pub struct LivePriceStore {
    records: Vec<LivePriceRecord>,
    last_refreshed: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl LivePriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a batch snapshot (one call for all symbols) and rebuild the
    /// collection against `symbols`.
    ///
    /// On failure the previous records are kept untouched and the error is
    /// returned so the caller can retry.
    pub async fn snapshot_refresh(
        &mut self,
        provider: &dyn QuoteProvider,
        symbols: &[Symbol],
    ) -> Result<usize, CoreError> {
        match provider.fetch_snapshot(symbols).await {
            Ok(fetched) => {
                self.apply_snapshot(fetched, symbols);
                Ok(self.records.len())
            }
            Err(e) => {
                warn!(
                    "Snapshot refresh via {} failed, keeping {} stale records: {e}",
                    provider.name(),
                    self.records.len()
                );
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Rebuild the collection: one record per entry of `symbols`, in that
    /// order, taken from `fetched` when present, else a placeholder.
    ///
    /// `symbols` must be the set that is current when the response is
    /// applied, so symbols removed while the request was in flight are not
    /// resurrected. Fetched rows for symbols outside the set are ignored.
    pub fn apply_snapshot(&mut self, fetched: Vec<LivePriceRecord>, symbols: &[Symbol]) {
        let mut by_symbol: HashMap<Symbol, LivePriceRecord> = HashMap::with_capacity(fetched.len());
        for record in fetched {
            by_symbol.insert(record.symbol.clone(), record);
        }

        let mut populated = 0;
        self.records = symbols
            .iter()
            .map(|symbol| match by_symbol.remove(symbol) {
                Some(record) => {
                    populated += 1;
                    record
                }
                None => LivePriceRecord::placeholder(symbol.clone()),
            })
            .collect();

        self.last_refreshed = Some(Utc::now());
        self.last_error = None;
        info!(
            "Live snapshot applied: {populated}/{} symbols priced",
            self.records.len()
        );
    }

    /// Apply a batch of trade pushes in order. Only `latest_price` and
    /// `timestamp` are written; unmatched symbols are dropped. When a batch
    /// carries several trades for one symbol the last one wins.
    ///
    /// Returns the number of updates that matched a record.
    pub fn apply_push(&mut self, updates: &[PushUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            match self.records.iter_mut().find(|r| r.symbol == update.symbol) {
                Some(record) => {
                    record.latest_price = Some(update.price);
                    record.timestamp = update.timestamp;
                    applied += 1;
                }
                None => debug!("Dropping push for untracked symbol {}", update.symbol),
            }
        }
        applied
    }

    /// Apply a full-price frame from the internal prices feed. Matched
    /// records get every price field replaced; unknown symbols are ignored.
    pub fn apply_price_frame(&mut self, frame: &[LivePriceRecord]) -> usize {
        let mut applied = 0;
        for incoming in frame {
            if let Some(record) = self.records.iter_mut().find(|r| r.symbol == incoming.symbol) {
                record.latest_price = incoming.latest_price;
                record.change = incoming.change;
                record.change_percent = incoming.change_percent;
                record.timestamp = incoming.timestamp;
                applied += 1;
            }
        }
        applied
    }

    #[must_use]
    pub fn records(&self) -> &[LivePriceRecord] {
        &self.records
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&LivePriceRecord> {
        self.records.iter().find(|r| r.symbol.matches(symbol))
    }

    /// Numeric latest price of a symbol, if one has been seen.
    #[must_use]
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).and_then(|r| r.latest_price)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// Message of the last failed snapshot, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
