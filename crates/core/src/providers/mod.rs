pub mod registry;
pub mod traits;

// API provider implementations
pub mod rest;
pub mod yahoo_finance;
