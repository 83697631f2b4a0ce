use std::collections::HashSet;

use crate::models::alert::Alert;
use crate::models::quote::LivePriceRecord;
use crate::models::symbol::Symbol;
use crate::services::valuation_service::live_price_index;

/// Detects alerts whose target has been crossed by the live price.
///
/// Each alert id is reported at most once until [`release`](Self::release)
/// is called for it, so a trigger request is never sent twice while the
/// first one is in flight or after it succeeded.
#[derive(Debug, Default)]
pub struct AlertService {
    reported: HashSet<i64>,
}

impl AlertService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of armed alerts whose symbol's live price crossed the target.
    /// Alerts without a numeric target or live price are skipped.
    pub fn detect_crossings(&mut self, alerts: &[Alert], live: &[LivePriceRecord]) -> Vec<i64> {
        if alerts.is_empty() || live.is_empty() {
            return Vec::new();
        }
        let prices = live_price_index(live);

        let mut crossed = Vec::new();
        for alert in alerts.iter().filter(|a| a.is_armed()) {
            let Some(target) = alert.target_price else { continue };
            let Some(live_price) = Symbol::new(&alert.symbol)
                .ok()
                .and_then(|s| prices.get(&s).copied())
            else {
                continue;
            };
            if alert.alert_type.is_crossed(live_price, target) && self.reported.insert(alert.id) {
                crossed.push(alert.id);
            }
        }
        crossed
    }

    /// Allow `alert_id` to be reported again (its trigger request failed).
    pub fn release(&mut self, alert_id: i64) {
        self.reported.remove(&alert_id);
    }

    pub fn is_reported(&self, alert_id: i64) -> bool {
        self.reported.contains(&alert_id)
    }

    pub fn reset(&mut self) {
        self.reported.clear();
    }
}
