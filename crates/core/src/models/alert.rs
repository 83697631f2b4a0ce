use serde::{Deserialize, Serialize};

use super::numeric::de_opt_f64;

/// Direction of a price alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "price_above")]
    PriceAbove,
    #[serde(rename = "price_below")]
    PriceBelow,
}

impl AlertType {
    /// Has `live` crossed `target` in this alert's direction?
    pub fn is_crossed(&self, live: f64, target: f64) -> bool {
        match self {
            AlertType::PriceAbove => live >= target,
            AlertType::PriceBelow => live <= target,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::PriceAbove => write!(f, "price_above"),
            AlertType::PriceBelow => write!(f, "price_below"),
        }
    }
}

/// A user's price alert, as served by the alerts backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub symbol: String,

    #[serde(default, deserialize_with = "de_opt_f64")]
    pub target_price: Option<f64>,

    #[serde(rename = "type")]
    pub alert_type: AlertType,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub triggered: bool,
}

fn default_enabled() -> bool {
    true
}

impl Alert {
    pub fn new(id: i64, symbol: impl Into<String>, alert_type: AlertType, target_price: f64) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            target_price: Some(target_price),
            alert_type,
            enabled: true,
            triggered: false,
        }
    }

    /// Enabled and not yet triggered.
    pub fn is_armed(&self) -> bool {
        self.enabled && !self.triggered
    }
}
