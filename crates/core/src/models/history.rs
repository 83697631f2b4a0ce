use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::numeric::{value_to_f64, value_to_timestamp_ms};

/// One trading interval of a symbol's price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Start of the interval. `None` when the source sent no usable
    /// date/timestamp; such points survive unfiltered reads only.
    pub time: Option<DateTime<Utc>>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
}

impl HistoricalPoint {
    pub fn new(time: DateTime<Utc>, close: f64) -> Self {
        Self {
            time: Some(time),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// Decode one backend candle: `{date|timestamp, open, high, low, close, volume}`.
    /// Returns `None` when `close` is missing or non-numeric.
    pub fn from_json(value: &Value) -> Option<Self> {
        let close = value.get("close").and_then(value_to_f64)?;
        let time = value
            .get("date")
            .filter(|v| !v.is_null())
            .or_else(|| value.get("timestamp"))
            .and_then(value_to_timestamp_ms)
            .and_then(DateTime::from_timestamp_millis);
        let field = |name: &str| value.get(name).and_then(value_to_f64);
        Some(Self {
            time,
            open: field("open"),
            high: field("high"),
            low: field("low"),
            close,
            volume: field("volume"),
        })
    }
}

/// Sort points ascending by time. Undated points keep their relative order
/// and sort first.
pub fn sort_series(points: &mut [HistoricalPoint]) {
    points.sort_by_key(|p| p.time);
}

/// A cached history for one symbol. Replaced wholesale on refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub series: Vec<HistoricalPoint>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(mut series: Vec<HistoricalPoint>, fetched_at: DateTime<Utc>) -> Self {
        sort_series(&mut series);
        Self { series, fetched_at }
    }

    /// Fresh while younger than `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Client-side chart window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneWeek,
    OneMonth,
    ThreeMonths,
    /// No filtering.
    All,
}

impl Timeframe {
    /// `"1w"`, `"1m"`, `"3m"`; anything else means the full series.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "1w" => Timeframe::OneWeek,
            "1m" => Timeframe::OneMonth,
            "3m" => Timeframe::ThreeMonths,
            _ => Timeframe::All,
        }
    }

    pub fn window(&self) -> Option<Duration> {
        match self {
            Timeframe::OneWeek => Some(Duration::days(7)),
            Timeframe::OneMonth => Some(Duration::days(30)),
            Timeframe::ThreeMonths => Some(Duration::days(90)),
            Timeframe::All => None,
        }
    }

    /// Earliest instant kept by this window, relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|w| now - w)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::OneWeek => write!(f, "1w"),
            Timeframe::OneMonth => write!(f, "1m"),
            Timeframe::ThreeMonths => write!(f, "3m"),
            Timeframe::All => write!(f, "all"),
        }
    }
}
