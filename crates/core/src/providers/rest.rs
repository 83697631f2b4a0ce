use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::alert::Alert;
use crate::models::history::HistoricalPoint;
use crate::models::quote::LivePriceRecord;
use crate::models::settings::Settings;
use crate::models::symbol::Symbol;
use super::traits::{AlertProvider, HistoryProvider, InterestProvider, QuoteProvider};

const PROVIDER: &str = "Backend";

/// Client for the portfolio backend's REST API.
///
/// - `GET  /batch-prices/?user_id=`          → snapshot of all interested symbols
/// - `POST /interests/`, `DELETE /interests/{symbol}/` → interest list
/// - `GET  /historical/prices/?symbol=&range=` → `{prices: {SYM: [...]}}`
/// - `POST /alerts/{id}/trigger/`            → server-side alert trigger
///
/// A bearer token, when configured, is attached to every request.
pub struct RestApiClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    user_id: Option<i64>,
    history_range: String,
}

impl RestApiClient {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
            user_id: settings.user_id,
            history_range: settings.history_range.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    fn require_user(&self) -> Result<i64, CoreError> {
        self.user_id
            .ok_or_else(|| CoreError::Config("user_id is required for this request".into()))
    }

    /// Send and turn non-2xx responses into `CoreError::Api`.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, CoreError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("{} {}", status.as_u16(), resp.url().path()),
            });
        }
        Ok(resp)
    }

    async fn fetch_batch(&self, user_id: i64) -> Result<Vec<LivePriceRecord>, CoreError> {
        let rows: Vec<Value> = self
            .send(self.get("/batch-prices/").query(&[("user_id", user_id)]))
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse batch prices: {e}"),
            })?;

        // One malformed row must not drop the whole snapshot.
        let records: Vec<LivePriceRecord> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect();
        Ok(records)
    }
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    prices: HashMap<String, Vec<Value>>,
}

#[async_trait]
impl QuoteProvider for RestApiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<LivePriceRecord>, CoreError> {
        let user_id = self.require_user()?;
        let records = self.fetch_batch(user_id).await?;
        debug!(
            "batch-prices returned {} records for {} requested symbols",
            records.len(),
            symbols.len()
        );
        Ok(records)
    }
}

#[async_trait]
impl HistoryProvider for RestApiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_history(&self, symbol: &Symbol) -> Result<Vec<HistoricalPoint>, CoreError> {
        let resp: HistoryResponse = self
            .send(self.get("/historical/prices/").query(&[
                ("symbol", symbol.as_str()),
                ("range", self.history_range.as_str()),
            ]))
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse history for {symbol}: {e}"),
            })?;

        let raw = resp
            .prices
            .into_iter()
            .find(|(key, _)| symbol.matches(key))
            .map(|(_, points)| points)
            .unwrap_or_default();

        let points: Vec<HistoricalPoint> = raw.iter().filter_map(HistoricalPoint::from_json).collect();
        if points.is_empty() {
            return Err(CoreError::HistoryNotAvailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(points)
    }
}

#[async_trait]
impl InterestProvider for RestApiClient {
    async fn list_interests(&self, user_id: i64) -> Result<Vec<LivePriceRecord>, CoreError> {
        self.fetch_batch(user_id).await
    }

    async fn add_interest(&self, user_id: i64, symbol: &Symbol) -> Result<(), CoreError> {
        let req = self.authorize(
            self.client
                .post(self.url("/interests/"))
                .json(&json!({ "user_id": user_id, "symbol": symbol })),
        );
        self.send(req).await?;
        Ok(())
    }

    async fn remove_interest(&self, user_id: i64, symbol: &Symbol) -> Result<(), CoreError> {
        let req = self.authorize(
            self.client
                .delete(self.url(&format!("/interests/{symbol}/")))
                .json(&json!({ "user_id": user_id })),
        );
        self.send(req).await?;
        Ok(())
    }
}

#[async_trait]
impl AlertProvider for RestApiClient {
    async fn trigger_alert(&self, alert_id: i64) -> Result<Alert, CoreError> {
        let req = self.authorize(
            self.client
                .post(self.url(&format!("/alerts/{alert_id}/trigger/"))),
        );
        Ok(self.send(req).await?.json().await?)
    }
}
