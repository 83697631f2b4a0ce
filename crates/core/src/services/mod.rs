pub mod alert_service;
pub mod history_cache;
pub mod live_price_store;
pub mod reconciliation;
pub mod symbol_registry;
pub mod valuation_service;
