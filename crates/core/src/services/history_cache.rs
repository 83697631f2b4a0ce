use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{info, warn};
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::history::{CacheEntry, HistoricalPoint, Timeframe};
use crate::models::settings::DEFAULT_HISTORY_CACHE_TTL_SECS;
use crate::models::symbol::Symbol;
use crate::providers::traits::HistoryProvider;

/// Outcome of one [`HistoricalSeriesCache::fetch`] call.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Symbols whose entry was replaced with a fresh series.
    pub fetched: Vec<Symbol>,
    /// Symbols skipped because their entry was still fresh.
    pub fresh: Vec<Symbol>,
    /// Symbols whose request failed; their previous entry is kept.
    pub failed: Vec<(Symbol, CoreError)>,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of network requests this fetch issued.
    pub fn requests(&self) -> usize {
        self.fetched.len() + self.failed.len()
    }
}

/// Per-symbol historical series with a freshness window.
///
/// Cache strategy:
/// - An entry younger than the TTL is fresh and is never refetched unless forced.
/// - Stale or missing symbols are fetched in parallel, one request each.
/// - Results replace entries wholesale; series are never merged.
/// - A failed symbol keeps whatever it had before and never aborts its siblings.
///
/// `fetch` takes `&mut self`, so at most one fetch per cache is in flight and
/// a symbol can never have two outstanding requests.
#[derive(Debug)]
pub struct HistoricalSeriesCache {
    entries: HashMap<Symbol, CacheEntry>,
    errors: HashMap<Symbol, String>,
    ttl: Duration,
}

impl HistoricalSeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            errors: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch every stale or missing symbol (or all of them when `force_refresh`).
    pub async fn fetch(
        &mut self,
        provider: &dyn HistoryProvider,
        symbols: &[Symbol],
        force_refresh: bool,
    ) -> FetchReport {
        self.fetch_at(provider, symbols, force_refresh, Utc::now()).await
    }

    /// [`fetch`](Self::fetch) against an explicit clock.
    pub async fn fetch_at(
        &mut self,
        provider: &dyn HistoryProvider,
        symbols: &[Symbol],
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        let (stale, fresh) = self.partition(symbols, force_refresh, now);
        report.fresh = fresh;

        if stale.is_empty() {
            return report;
        }

        let results = join_all(stale.into_iter().map(|symbol| async move {
            let result = provider.fetch_history(&symbol).await;
            (symbol, result)
        }))
        .await;

        for (symbol, result) in results {
            match result {
                Ok(series) => {
                    self.errors.remove(&symbol);
                    self.entries.insert(symbol.clone(), CacheEntry::new(series, now));
                    report.fetched.push(symbol);
                }
                Err(e) => {
                    warn!("History fetch for {symbol} via {} failed: {e}", provider.name());
                    self.errors.insert(symbol.clone(), e.to_string());
                    report.failed.push((symbol, e));
                }
            }
        }

        info!(
            "History fetch: {} fetched, {} fresh, {} failed",
            report.fetched.len(),
            report.fresh.len(),
            report.failed.len()
        );
        report
    }

    /// Split `symbols` (deduplicated, order kept) into (to-fetch, fresh).
    pub fn partition(
        &self,
        symbols: &[Symbol],
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> (Vec<Symbol>, Vec<Symbol>) {
        let mut stale = Vec::new();
        let mut fresh = Vec::new();
        for symbol in symbols {
            if stale.contains(symbol) || fresh.contains(symbol) {
                continue;
            }
            let is_fresh = !force_refresh
                && self
                    .entries
                    .get(symbol)
                    .is_some_and(|entry| entry.is_fresh(now, self.ttl));
            if is_fresh {
                fresh.push(symbol.clone());
            } else {
                stale.push(symbol.clone());
            }
        }
        (stale, fresh)
    }

    /// Cached series per symbol, cut to `timeframe`. Pure read, no I/O.
    /// Symbols without an entry are omitted from the result.
    #[must_use]
    pub fn get_filtered(
        &self,
        symbols: &[Symbol],
        timeframe: Timeframe,
    ) -> HashMap<Symbol, Vec<HistoricalPoint>> {
        self.get_filtered_at(symbols, timeframe, Utc::now())
    }

    /// [`get_filtered`](Self::get_filtered) against an explicit clock.
    #[must_use]
    pub fn get_filtered_at(
        &self,
        symbols: &[Symbol],
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> HashMap<Symbol, Vec<HistoricalPoint>> {
        let cutoff = timeframe.cutoff(now);
        symbols
            .iter()
            .filter_map(|symbol| {
                let entry = self.entries.get(symbol)?;
                let series = match cutoff {
                    None => entry.series.clone(),
                    Some(cutoff) => entry
                        .series
                        .iter()
                        .filter(|p| p.time.is_some_and(|t| t >= cutoff))
                        .cloned()
                        .collect(),
                };
                Some((symbol.clone(), series))
            })
            .collect()
    }

    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<&CacheEntry> {
        self.entries.get(symbol)
    }

    /// Seed or overwrite an entry directly (offline data, tests).
    pub fn insert(&mut self, symbol: Symbol, series: Vec<HistoricalPoint>, fetched_at: DateTime<Utc>) {
        self.entries.insert(symbol, CacheEntry::new(series, fetched_at));
    }

    /// Drop a symbol's entry so the next fetch requests it again.
    pub fn invalidate(&mut self, symbol: &Symbol) -> bool {
        self.errors.remove(symbol);
        self.entries.remove(symbol).is_some()
    }

    /// Drop entries and errors of symbols not in `symbols`.
    /// Returns how many entries were evicted.
    pub fn retain(&mut self, symbols: &[Symbol]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|symbol, _| symbols.contains(symbol));
        self.errors.retain(|symbol, _| symbols.contains(symbol));
        before - self.entries.len()
    }

    /// Message of the last failed fetch for `symbol`, cleared on success.
    #[must_use]
    pub fn last_error(&self, symbol: &Symbol) -> Option<&str> {
        self.errors.get(symbol).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.errors.clear();
    }
}

impl Default for HistoricalSeriesCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_HISTORY_CACHE_TTL_SECS as i64))
    }
}
