use std::collections::HashMap;

use crate::models::portfolio::{Holding, Portfolio};
use crate::models::quote::LivePriceRecord;
use crate::models::symbol::Symbol;
use crate::models::valuation::{HoldingValuation, PortfolioOverview, PortfolioValuation};

/// Derives portfolio value, gain/loss and return from holdings and the
/// current live prices.
///
/// Pure business logic: no I/O, no state carried between calls. Safe to
/// call on every price tick.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Value one portfolio against the given live records.
    pub fn valuate(&self, portfolio: &Portfolio, live: &[LivePriceRecord]) -> PortfolioValuation {
        let prices = live_price_index(live);
        self.valuate_indexed(portfolio, &prices)
    }

    /// Totals across all portfolios of a user.
    pub fn overview(&self, portfolios: &[Portfolio], live: &[LivePriceRecord]) -> PortfolioOverview {
        let prices = live_price_index(live);
        let mut overview = PortfolioOverview {
            portfolio_count: portfolios.len(),
            ..PortfolioOverview::default()
        };
        for portfolio in portfolios {
            let valuation = self.valuate_indexed(portfolio, &prices);
            overview.total_value += valuation.total_value;
            overview.total_gain_loss += valuation.total_gain_loss;
            overview.total_stocks += portfolio.holdings.len();
        }
        overview
    }

    /// Value a single holding.
    ///
    /// Price resolution: live price if numeric, else the holding's
    /// last-known price, else its purchase price.
    pub fn valuate_holding(&self, holding: &Holding, prices: &HashMap<Symbol, f64>) -> HoldingValuation {
        let live = holding
            .canonical_symbol()
            .and_then(|symbol| prices.get(&symbol).copied());
        let current_price = live
            .or(holding.current_price.filter(|p| p.is_finite()))
            .or(holding.purchase_price);

        let (total_value, gain_loss, gain_loss_percent) =
            match (holding.shares, holding.purchase_price, current_price) {
                (Some(shares), Some(purchase), Some(current)) => {
                    let pct = if purchase != 0.0 {
                        Some((current - purchase) / purchase * 100.0)
                    } else {
                        None
                    };
                    (
                        Some(shares * current),
                        Some((current - purchase) * shares),
                        pct,
                    )
                }
                _ => (None, None, None),
            };

        HoldingValuation {
            symbol: holding.symbol.clone(),
            current_price,
            total_value,
            gain_loss,
            gain_loss_percent,
            is_live: live.is_some(),
            included: total_value.is_some(),
        }
    }

    fn valuate_indexed(&self, portfolio: &Portfolio, prices: &HashMap<Symbol, f64>) -> PortfolioValuation {
        let mut total_value = 0.0;
        let mut total_cost = 0.0;
        let mut total_gain_loss = 0.0;

        let holdings: Vec<HoldingValuation> = portfolio
            .holdings
            .iter()
            .map(|holding| {
                let valuation = self.valuate_holding(holding, prices);
                if let (Some(value), Some(gain), Some(cost)) =
                    (valuation.total_value, valuation.gain_loss, holding.cost_basis())
                {
                    total_value += value;
                    total_gain_loss += gain;
                    total_cost += cost;
                }
                valuation
            })
            .collect();

        let avg_return_percent = if total_cost != 0.0 {
            total_gain_loss / total_cost * 100.0
        } else {
            0.0
        };

        PortfolioValuation {
            portfolio_id: portfolio.id,
            total_value,
            total_cost,
            total_gain_loss,
            avg_return_percent,
            holdings,
        }
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbol → numeric latest price. Records without a price are skipped.
pub fn live_price_index(live: &[LivePriceRecord]) -> HashMap<Symbol, f64> {
    live.iter()
        .filter_map(|r| {
            r.latest_price
                .filter(|p| p.is_finite())
                .map(|p| (r.symbol.clone(), p))
        })
        .collect()
}
