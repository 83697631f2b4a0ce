use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use stock_live_core::errors::CoreError;
use stock_live_core::models::alert::{Alert, AlertType};
use stock_live_core::models::history::{CacheEntry, HistoricalPoint, Timeframe};
use stock_live_core::models::portfolio::{Holding, Portfolio};
use stock_live_core::models::quote::LivePriceRecord;
use stock_live_core::models::settings::{
    Settings, DEFAULT_API_BASE_URL, DEFAULT_HISTORY_CACHE_TTL_SECS, DEFAULT_RECONNECT_DELAY_MS,
    MAX_HISTORY_CACHE_TTL_SECS,
};
use stock_live_core::models::symbol::Symbol;

fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
//  Symbol
// ═══════════════════════════════════════════════════════════════════

mod symbol {
    use super::*;

    #[test]
    fn canonicalized_to_uppercase() {
        assert_eq!(sym("aapl").as_str(), "AAPL");
        assert_eq!(sym("  msft ").as_str(), "MSFT");
    }

    #[test]
    fn case_variants_are_equal() {
        assert_eq!(sym("tsla"), sym("TSLA"));
        let mut map = HashMap::new();
        map.insert(sym("nvda"), 1);
        assert_eq!(map.get(&sym("NVDA")), Some(&1));
    }

    #[test]
    fn matches_is_case_insensitive() {
        assert!(sym("AAPL").matches("aapl"));
        assert!(sym("AAPL").matches(" Aapl "));
        assert!(!sym("AAPL").matches("AAP"));
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(matches!(Symbol::new(""), Err(CoreError::InvalidSymbol(_))));
        assert!(matches!(Symbol::new("   "), Err(CoreError::InvalidSymbol(_))));
        assert!(matches!(Symbol::new("BRK B"), Err(CoreError::InvalidSymbol(_))));
    }

    #[test]
    fn dotted_tickers_are_valid() {
        assert_eq!(sym("brk.b").as_str(), "BRK.B");
    }

    #[test]
    fn from_str_and_display() {
        let s: Symbol = "goog".parse().unwrap();
        assert_eq!(s.to_string(), "GOOG");
    }

    #[test]
    fn deserialize_canonicalizes() {
        let s: Symbol = serde_json::from_str("\"amd\"").unwrap();
        assert_eq!(s, sym("AMD"));
        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&sym("ibm")).unwrap(), "\"IBM\"");
    }
}

// ═══════════════════════════════════════════════════════════════════
//  LivePriceRecord
// ═══════════════════════════════════════════════════════════════════

mod live_price_record {
    use super::*;

    #[test]
    fn placeholder_has_all_fields_null() {
        let r = LivePriceRecord::placeholder(sym("AAPL"));
        assert!(r.is_placeholder());
        assert_eq!(r.latest_price, None);
        assert_eq!(r.change, None);
        assert_eq!(r.change_percent, None);
        assert_eq!(r.timestamp, None);
    }

    #[test]
    fn deserializes_backend_row() {
        let r: LivePriceRecord = serde_json::from_value(json!({
            "symbol": "aapl",
            "latestPrice": 189.5,
            "change": -1.25,
            "changePercent": "-0.65",
            "timestamp": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert_eq!(r.symbol, sym("AAPL"));
        assert_eq!(r.latest_price, Some(189.5));
        assert_eq!(r.change, Some(-1.25));
        assert_eq!(r.change_percent, Some(-0.65));
        assert_eq!(r.timestamp, Some(1_700_000_000_000));
        assert!(!r.is_placeholder());
    }

    #[test]
    fn null_and_missing_fields_become_none() {
        let r: LivePriceRecord = serde_json::from_value(json!({
            "symbol": "MSFT",
            "latestPrice": null,
            "change": "n/a"
        }))
        .unwrap();
        assert!(r.is_placeholder());
    }

    #[test]
    fn serializes_camel_case() {
        let mut r = LivePriceRecord::placeholder(sym("AAPL"));
        r.change_percent = Some(1.0);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["changePercent"], 1.0);
        assert!(v.get("latestPrice").is_some());
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Holding / Portfolio
// ═══════════════════════════════════════════════════════════════════

mod holding {
    use super::*;

    #[test]
    fn decimal_strings_are_parsed() {
        let h: Holding = serde_json::from_value(json!({
            "id": 7,
            "symbol": "aapl",
            "company_name": "Apple Inc.",
            "shares": "10.0000",
            "purchase_price": "150.00",
            "current_price": "175.25",
            "purchase_date": "2024-01-15"
        }))
        .unwrap();
        assert_eq!(h.shares, Some(10.0));
        assert_eq!(h.purchase_price, Some(150.0));
        assert_eq!(h.current_price, Some(175.25));
        assert_eq!(h.canonical_symbol(), Some(sym("AAPL")));
        assert_eq!(h.cost_basis(), Some(1500.0));
    }

    #[test]
    fn non_numeric_fields_become_none() {
        let h: Holding = serde_json::from_value(json!({
            "symbol": "MSFT",
            "shares": "abc",
            "purchase_price": null
        }))
        .unwrap();
        assert_eq!(h.shares, None);
        assert_eq!(h.purchase_price, None);
        assert_eq!(h.cost_basis(), None);
    }

    #[test]
    fn portfolio_reads_nested_stocks() {
        let p: Portfolio = serde_json::from_value(json!({
            "id": 1,
            "name": "Tech",
            "stocks": [
                { "symbol": "AAPL", "shares": 2, "purchase_price": 100 },
                { "symbol": "MSFT", "shares": "3", "purchase_price": "200" }
            ]
        }))
        .unwrap();
        assert_eq!(p.id, Some(1));
        assert_eq!(p.holdings.len(), 2);
        assert_eq!(p.holdings[1].shares, Some(3.0));
    }

    #[test]
    fn builder_sets_current_price() {
        let h = Holding::new("AAPL", 1.0, 10.0).with_current_price(12.0);
        assert_eq!(h.current_price, Some(12.0));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  HistoricalPoint / CacheEntry
// ═══════════════════════════════════════════════════════════════════

mod history {
    use super::*;

    #[test]
    fn point_from_date_field() {
        let p = HistoricalPoint::from_json(&json!({
            "date": "2024-01-02", "open": "1.0", "high": 2.0, "low": 0.5,
            "close": "1.5", "volume": 1000
        }))
        .unwrap();
        assert_eq!(p.time, Some(at(2024, 1, 2)));
        assert_eq!(p.close, 1.5);
        assert_eq!(p.open, Some(1.0));
        assert_eq!(p.volume, Some(1000.0));
    }

    #[test]
    fn point_falls_back_to_timestamp() {
        let p = HistoricalPoint::from_json(&json!({
            "date": null, "timestamp": 1_704_153_600_000_i64, "close": 3.0
        }))
        .unwrap();
        assert_eq!(p.time, Some(at(2024, 1, 2)));
    }

    #[test]
    fn point_without_close_is_rejected() {
        assert!(HistoricalPoint::from_json(&json!({ "date": "2024-01-02" })).is_none());
        assert!(HistoricalPoint::from_json(&json!({ "close": "x" })).is_none());
    }

    #[test]
    fn undated_point_is_kept_without_time() {
        let p = HistoricalPoint::from_json(&json!({ "close": 4.0 })).unwrap();
        assert_eq!(p.time, None);
    }

    #[test]
    fn cache_entry_sorts_ascending() {
        let entry = CacheEntry::new(
            vec![
                HistoricalPoint::new(at(2024, 3, 1), 3.0),
                HistoricalPoint::new(at(2024, 1, 1), 1.0),
                HistoricalPoint::new(at(2024, 2, 1), 2.0),
            ],
            at(2024, 3, 2),
        );
        let closes: Vec<f64> = entry.series.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn cache_entry_freshness_boundary() {
        let fetched = at(2024, 1, 1);
        let entry = CacheEntry::new(vec![], fetched);
        let ttl = Duration::minutes(30);
        assert!(entry.is_fresh(fetched + Duration::minutes(29), ttl));
        assert!(!entry.is_fresh(fetched + Duration::minutes(30), ttl));
        assert!(!entry.is_fresh(fetched + Duration::hours(2), ttl));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Timeframe
// ═══════════════════════════════════════════════════════════════════

mod timeframe {
    use super::*;

    #[test]
    fn parses_named_windows() {
        assert_eq!(Timeframe::parse("1w"), Timeframe::OneWeek);
        assert_eq!(Timeframe::parse("1m"), Timeframe::OneMonth);
        assert_eq!(Timeframe::parse("3m"), Timeframe::ThreeMonths);
    }

    #[test]
    fn unknown_values_mean_all() {
        assert_eq!(Timeframe::parse("6m"), Timeframe::All);
        assert_eq!(Timeframe::parse(""), Timeframe::All);
        assert_eq!(Timeframe::parse("1W"), Timeframe::All);
    }

    #[test]
    fn windows_in_days() {
        assert_eq!(Timeframe::OneWeek.window(), Some(Duration::days(7)));
        assert_eq!(Timeframe::OneMonth.window(), Some(Duration::days(30)));
        assert_eq!(Timeframe::ThreeMonths.window(), Some(Duration::days(90)));
        assert_eq!(Timeframe::All.window(), None);
    }

    #[test]
    fn cutoff_is_now_minus_window() {
        let now = at(2024, 4, 1);
        assert_eq!(Timeframe::OneWeek.cutoff(now), Some(at(2024, 3, 25)));
        assert_eq!(Timeframe::All.cutoff(now), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for tf in [Timeframe::OneWeek, Timeframe::OneMonth, Timeframe::ThreeMonths] {
            assert_eq!(Timeframe::parse(&tf.to_string()), tf);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Alert
// ═══════════════════════════════════════════════════════════════════

mod alert {
    use super::*;

    #[test]
    fn deserializes_backend_alert() {
        let a: Alert = serde_json::from_value(json!({
            "id": 3, "symbol": "AAPL", "target_price": "200.00",
            "type": "price_above", "triggered": false
        }))
        .unwrap();
        assert_eq!(a.alert_type, AlertType::PriceAbove);
        assert_eq!(a.target_price, Some(200.0));
        assert!(a.enabled);
        assert!(a.is_armed());
    }

    #[test]
    fn crossing_directions() {
        assert!(AlertType::PriceAbove.is_crossed(200.0, 200.0));
        assert!(AlertType::PriceAbove.is_crossed(201.0, 200.0));
        assert!(!AlertType::PriceAbove.is_crossed(199.0, 200.0));
        assert!(AlertType::PriceBelow.is_crossed(50.0, 50.0));
        assert!(!AlertType::PriceBelow.is_crossed(51.0, 50.0));
    }

    #[test]
    fn triggered_or_disabled_is_not_armed() {
        let mut a = Alert::new(1, "AAPL", AlertType::PriceBelow, 10.0);
        a.triggered = true;
        assert!(!a.is_armed());
        let mut b = Alert::new(2, "AAPL", AlertType::PriceBelow, 10.0);
        b.enabled = false;
        assert!(!b.is_armed());
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(s.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
        assert_eq!(s.history_cache_ttl_secs, DEFAULT_HISTORY_CACHE_TTL_SECS);
        assert_eq!(s.reconnect_delay(), std::time::Duration::from_millis(2000));
        assert_eq!(s.history_cache_ttl().unwrap(), Duration::minutes(30));
        assert_eq!(s.history_range, "6M");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn from_lookup_reads_variables() {
        let s = Settings::from_lookup(lookup(&[
            ("STOCK_API_BASE_URL", "https://api.example.com/api/"),
            ("FINNHUB_API_KEY", "tok"),
            ("PRICES_WS_URL", "wss://example.com/ws/prices/"),
            ("STOCK_USER_ID", "42"),
            ("STOCK_RECONNECT_DELAY_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(s.api_base_url, "https://api.example.com/api");
        assert_eq!(s.finnhub_token.as_deref(), Some("tok"));
        assert_eq!(s.prices_feed_url.as_deref(), Some("wss://example.com/ws/prices/"));
        assert_eq!(s.user_id, Some(42));
        assert_eq!(s.reconnect_delay_ms, 500);
    }

    #[test]
    fn blank_variables_are_ignored() {
        let s = Settings::from_lookup(lookup(&[("FINNHUB_API_KEY", "  ")])).unwrap();
        assert_eq!(s.finnhub_token, None);
    }

    #[test]
    fn bad_user_id_is_config_error() {
        let err = Settings::from_lookup(lookup(&[("STOCK_USER_ID", "me")])).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn zero_reconnect_delay_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("STOCK_RECONNECT_DELAY_MS", "0")])).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn validate_rejects_empty_base_url_and_zero_ttl() {
        let mut s = Settings::default();
        s.api_base_url = " ".into();
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.history_cache_ttl_secs = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn oversized_ttl_is_rejected_not_wrapped() {
        let s: Settings =
            serde_json::from_value(json!({ "history_cache_ttl_secs": 10_000_000_000_000_000u64 }))
                .unwrap();
        assert!(matches!(s.validate(), Err(CoreError::Config(_))));
        assert!(matches!(s.history_cache_ttl(), Err(CoreError::Config(_))));

        let mut s = Settings::default();
        s.history_cache_ttl_secs = u64::MAX;
        assert!(s.validate().is_err());
        assert!(s.history_cache_ttl().is_err());
    }

    #[test]
    fn largest_ttl_still_converts() {
        let mut s = Settings::default();
        s.history_cache_ttl_secs = MAX_HISTORY_CACHE_TTL_SECS;
        assert!(s.validate().is_ok());
        let ttl = s.history_cache_ttl().unwrap();
        assert!(ttl > Duration::zero());
    }

    #[test]
    fn market_endpoint_requires_token() {
        let mut s = Settings::default();
        assert_eq!(s.market_feed_endpoint(), None);
        s.finnhub_token = Some("abc".into());
        assert_eq!(s.market_feed_endpoint().as_deref(), Some("wss://ws.finnhub.io?token=abc"));
        s.market_feed_url = "wss://feed.example.com/?v=2".into();
        assert_eq!(
            s.market_feed_endpoint().as_deref(),
            Some("wss://feed.example.com/?v=2&token=abc")
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: Settings = serde_json::from_value(json!({ "user_id": 5 })).unwrap();
        assert_eq!(s.user_id, Some(5));
        assert_eq!(s.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
    }
}
