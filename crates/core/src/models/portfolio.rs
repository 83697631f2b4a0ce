use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::numeric::de_opt_f64;
use super::symbol::Symbol;

/// A portfolio as returned by the CRUD backend, with its nested holdings.
///
/// Owned by the backend; this crate only reads it to derive valuations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Holdings of this portfolio (`stocks[]` on the wire).
    #[serde(default, rename = "stocks")]
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>, holdings: Vec<Holding>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            holdings,
        }
    }
}

/// A quantity of one symbol owned within a portfolio.
///
/// Numeric fields are `None` when the backend value is missing or not a
/// number; such holdings are excluded from aggregate valuation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    #[serde(default)]
    pub id: Option<i64>,

    /// Raw ticker as stored by the backend.
    pub symbol: String,

    #[serde(default)]
    pub company_name: String,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub shares: Option<f64>,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub purchase_price: Option<f64>,

    /// Last price known to the backend; fallback when no live price exists.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub current_price: Option<f64>,

    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, shares: f64, purchase_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            shares: Some(shares),
            purchase_price: Some(purchase_price),
            ..Self::default()
        }
    }

    /// Set the backend's last-known price.
    pub fn with_current_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }

    /// Canonical symbol, if the stored ticker is valid.
    pub fn canonical_symbol(&self) -> Option<Symbol> {
        Symbol::new(&self.symbol).ok()
    }

    /// Cost basis: shares × purchase price, when both are numeric.
    pub fn cost_basis(&self) -> Option<f64> {
        Some(self.shares? * self.purchase_price?)
    }
}
