use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::alert::Alert;
use crate::models::history::HistoricalPoint;
use crate::models::quote::LivePriceRecord;
use crate::models::symbol::Symbol;

/// Batch snapshot of current prices.
///
/// One call per refresh cycle, never one per symbol. Implementations return
/// whatever the backend knows; missing symbols are filled in by the store.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<LivePriceRecord>, CoreError>;
}

/// Per-symbol historical series. Each symbol is an independent request.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Price history for one symbol. Points need not be sorted.
    async fn fetch_history(&self, symbol: &Symbol) -> Result<Vec<HistoricalPoint>, CoreError>;
}

/// The user's persisted list of interested symbols.
#[async_trait]
pub trait InterestProvider: Send + Sync {
    /// Every interested symbol with the backend's current price row for it.
    /// The rows double as the startup snapshot, so loading needs one request.
    async fn list_interests(&self, user_id: i64) -> Result<Vec<LivePriceRecord>, CoreError>;

    async fn add_interest(&self, user_id: i64, symbol: &Symbol) -> Result<(), CoreError>;

    async fn remove_interest(&self, user_id: i64, symbol: &Symbol) -> Result<(), CoreError>;
}

/// Server-side alert trigger.
#[async_trait]
pub trait AlertProvider: Send + Sync {
    /// Mark an alert as triggered; returns the updated alert.
    async fn trigger_alert(&self, alert_id: i64) -> Result<Alert, CoreError>;
}
