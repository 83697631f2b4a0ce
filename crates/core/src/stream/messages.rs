use log::debug;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::models::numeric::{value_to_f64, value_to_timestamp_ms};
use crate::models::quote::{LivePriceRecord, PushUpdate};
use crate::models::symbol::Symbol;

use super::feed::{ConnectionStatus, FeedProtocol};

/// Typed event produced by a live feed and consumed by the store owner.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Trade pushes: `{type:"trade", data:[{s, p, t}, ...]}`.
    Trades(Vec<PushUpdate>),
    /// Full price frame: `{prices:[{symbol, latestPrice, ...}, ...]}`,
    /// already deduplicated by symbol.
    Prices(Vec<LivePriceRecord>),
    /// Connection lifecycle of one feed.
    Status {
        protocol: FeedProtocol,
        status: ConnectionStatus,
    },
}

/// Parse one text frame from either feed.
///
/// Anything that is not valid JSON, not a known message shape, or carries no
/// usable entries yields `None`: the frame is dropped without side effects.
pub fn parse_frame(text: &str) -> Option<StreamEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!("Dropping malformed feed frame: {e}");
            return None;
        }
    };

    if value.get("type").and_then(Value::as_str) == Some("trade") {
        let trades = value.get("data")?.as_array()?;
        let updates: Vec<PushUpdate> = trades.iter().filter_map(parse_trade).collect();
        return (!updates.is_empty()).then_some(StreamEvent::Trades(updates));
    }

    if let Some(prices) = value.get("prices").and_then(Value::as_array) {
        let records: Vec<LivePriceRecord> = prices
            .iter()
            .filter_map(|row| serde_json::from_value(row.clone()).ok())
            .collect();
        let records = dedupe_by_symbol(records);
        return (!records.is_empty()).then_some(StreamEvent::Prices(records));
    }

    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        debug!("Ignoring non-trade feed message: {kind}");
    }
    None
}

fn parse_trade(trade: &Value) -> Option<PushUpdate> {
    let symbol = Symbol::new(trade.get("s")?.as_str()?).ok()?;
    let price = value_to_f64(trade.get("p")?)?;
    let timestamp = trade.get("t").and_then(value_to_timestamp_ms);
    Some(PushUpdate::new(symbol, price, timestamp))
}

/// One record per symbol, last occurrence wins, first-seen order kept.
pub fn dedupe_by_symbol(records: Vec<LivePriceRecord>) -> Vec<LivePriceRecord> {
    let mut position: HashMap<Symbol, usize> = HashMap::new();
    let mut out: Vec<LivePriceRecord> = Vec::with_capacity(records.len());
    for record in records {
        match position.get(&record.symbol) {
            Some(&idx) => out[idx] = record,
            None => {
                position.insert(record.symbol.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

pub fn subscribe_message(symbol: &Symbol) -> String {
    json!({ "type": "subscribe", "symbol": symbol }).to_string()
}

pub fn unsubscribe_message(symbol: &Symbol) -> String {
    json!({ "type": "unsubscribe", "symbol": symbol }).to_string()
}
