use serde::{Deserialize, Serialize};

use super::numeric::{de_opt_f64, de_opt_timestamp};
use super::symbol::Symbol;

/// The live price state of one symbol.
///
/// Every price field is nullable: a record exists as soon as the symbol is
/// of interest, even before any price has been seen ("N/A" in a view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePriceRecord {
    pub symbol: Symbol,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub latest_price: Option<f64>,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub change: Option<f64>,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub change_percent: Option<f64>,

    /// Unix timestamp in milliseconds of the last price.
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<i64>,
}

impl LivePriceRecord {
    /// The canonical placeholder: symbol known, no price data yet.
    pub fn placeholder(symbol: Symbol) -> Self {
        Self {
            symbol,
            latest_price: None,
            change: None,
            change_percent: None,
            timestamp: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.latest_price.is_none()
            && self.change.is_none()
            && self.change_percent.is_none()
            && self.timestamp.is_none()
    }
}

/// A partial price change delivered by the market feed: one trade.
///
/// Only carries price and time; `change`/`changePercent` are never part of
/// a push and stay untouched when it is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushUpdate {
    pub symbol: Symbol,
    pub price: f64,
    pub timestamp: Option<i64>,
}

impl PushUpdate {
    pub fn new(symbol: Symbol, price: f64, timestamp: Option<i64>) -> Self {
        Self {
            symbol,
            price,
            timestamp,
        }
    }
}
