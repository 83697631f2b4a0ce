use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;

use crate::errors::CoreError;
use crate::models::history::HistoricalPoint;
use crate::models::symbol::Symbol;
use super::traits::HistoryProvider;

const PROVIDER: &str = "Yahoo Finance";

/// Yahoo Finance daily candles, used as a fallback history source.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Data**: Full historical OHLCV.
///
/// Uses the `yahoo_finance_api` crate which wraps Yahoo Finance's
/// public endpoints.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
    lookback: Duration,
}

impl YahooFinanceProvider {
    /// `range` uses the backend's notation (`"1W"`, `"1M"`, `"3M"`, `"6M"`, `"1Y"`).
    pub fn new(range: &str) -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to create connector: {e}"),
            })?;
        Ok(Self {
            connector,
            lookback: range_to_lookback(range),
        })
    }

    fn to_offset_datetime(at: DateTime<Utc>) -> Result<OffsetDateTime, CoreError> {
        OffsetDateTime::from_unix_timestamp(at.timestamp()).map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Invalid timestamp {at}: {e}"),
        })
    }
}

/// Translate a range code into a lookback window. Unknown or out-of-range
/// codes fall back to six months.
pub fn range_to_lookback(range: &str) -> Duration {
    let default = Duration::days(183);
    let upper = range.trim().to_uppercase();
    let Some(unit) = upper.chars().last() else {
        return default;
    };
    let count: i64 = upper[..upper.len() - unit.len_utf8()].parse().unwrap_or(0);
    if count <= 0 {
        return default;
    }
    let lookback = match unit {
        'D' => Duration::try_days(count),
        'W' => Duration::try_weeks(count),
        'M' => count.checked_mul(30).and_then(Duration::try_days),
        'Y' => count.checked_mul(365).and_then(Duration::try_days),
        _ => None,
    };
    lookback.unwrap_or(default)
}

#[async_trait]
impl HistoryProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_history(&self, symbol: &Symbol) -> Result<Vec<HistoricalPoint>, CoreError> {
        let now = Utc::now();
        let start = now
            .checked_sub_signed(self.lookback)
            .ok_or_else(|| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Lookback {} reaches past the supported date range", self.lookback),
            })
            .and_then(Self::to_offset_datetime)?;
        let end = Self::to_offset_datetime(now)?;

        let resp = self
            .connector
            .get_quote_history(symbol.as_str(), start, end)
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch history for {symbol}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {symbol}: {e}"),
        })?;

        let points: Vec<HistoricalPoint> = quotes
            .iter()
            .filter(|q| q.close.is_finite())
            .map(|q| HistoricalPoint {
                time: DateTime::from_timestamp(q.timestamp as i64, 0),
                open: Some(q.open),
                high: Some(q.high),
                low: Some(q.low),
                close: q.close,
                volume: Some(q.volume as f64),
            })
            .collect();

        if points.is_empty() {
            return Err(CoreError::HistoryNotAvailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::range_to_lookback;
    use chrono::Duration;

    #[test]
    fn range_codes() {
        assert_eq!(range_to_lookback("1W"), Duration::weeks(1));
        assert_eq!(range_to_lookback("3m"), Duration::days(90));
        assert_eq!(range_to_lookback("1Y"), Duration::days(365));
        assert_eq!(range_to_lookback("garbage"), Duration::days(183));
        assert_eq!(range_to_lookback(""), Duration::days(183));
        assert_eq!(range_to_lookback("0M"), Duration::days(183));
    }

    #[test]
    fn oversized_codes_fall_back() {
        assert_eq!(range_to_lookback("99999999999999999Y"), Duration::days(183));
        assert_eq!(range_to_lookback("99999999999999999M"), Duration::days(183));
        assert_eq!(range_to_lookback("9999999999999999W"), Duration::days(183));
        assert_eq!(range_to_lookback("9223372036854775807D"), Duration::days(183));
    }
}
