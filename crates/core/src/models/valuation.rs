use serde::{Deserialize, Serialize};

/// Derived valuation of a single holding. Never stored; recomputed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    /// Ticker as stored on the holding
    pub symbol: String,

    /// Live price if numeric, else the holding's last-known price,
    /// else its purchase price
    pub current_price: Option<f64>,

    /// shares × current_price
    pub total_value: Option<f64>,

    /// (current_price − purchase_price) × shares
    pub gain_loss: Option<f64>,

    /// (current_price − purchase_price) / purchase_price × 100
    pub gain_loss_percent: Option<f64>,

    /// True when the price came from the live store
    pub is_live: bool,

    /// Whether this holding contributes to the portfolio aggregate
    pub included: bool,
}

/// Derived valuation of a whole portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub portfolio_id: Option<i64>,

    /// Σ shares × current_price over included holdings
    pub total_value: f64,

    /// Σ shares × purchase_price over included holdings
    pub total_cost: f64,

    /// Σ gain/loss over included holdings
    pub total_gain_loss: f64,

    /// total_gain_loss / total_cost × 100, or 0 when total_cost is 0
    pub avg_return_percent: f64,

    /// Per-holding breakdown, in holding order
    pub holdings: Vec<HoldingValuation>,
}

/// Totals across every portfolio of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub total_value: f64,
    pub total_gain_loss: f64,
    /// Number of holdings across all portfolios, numeric or not
    pub total_stocks: usize,
    pub portfolio_count: usize,
}
