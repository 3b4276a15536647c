//! Stock capability.
//!
//! Provider order: Alpha Vantage daily series (US symbols only; mainland
//! and HK codes are numeric and unsupported there) → deterministic mock.
//! Company names are translated to ticker codes before any lookup.

use crate::{det_hash, int_param, string_param};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use lingxi_config::StockConfig;
use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::tool::{Capability, ParamMap, ToolKind};
use lingxi_oracle::rules;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, warn};

const ALPHAVANTAGE_URL: &str = "https://www.alphavantage.co/query";

pub struct StockCapability {
    config: StockConfig,
    client: reqwest::Client,
}

impl StockCapability {
    pub fn new(config: StockConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn fetch_alphavantage(
        &self,
        key: &str,
        symbol: &str,
        name: &str,
        days: usize,
    ) -> Result<serde_json::Value, String> {
        let symbol = symbol.to_ascii_uppercase();
        let response = self
            .client
            .get(ALPHAVANTAGE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol.as_str()),
                ("apikey", key),
                ("outputsize", "compact"),
            ])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("bad status: {e}"))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        if let Some(message) = body.get("Error Message").or_else(|| body.get("Note")) {
            return Err(format!("API error: {message}"));
        }
        let Some(series) = body.get("Time Series (Daily)").and_then(|v| v.as_object()) else {
            return Err("response missing daily time series".into());
        };

        // Most recent N trading days, returned in ascending date order.
        let mut dates: Vec<&String> = series.keys().collect();
        dates.sort_by(|a, b| b.cmp(a));
        dates.truncate(days);
        dates.reverse();

        let prices: Vec<serde_json::Value> = dates
            .iter()
            .filter_map(|date| {
                let day = series.get(*date)?;
                Some(json!({
                    "date": date,
                    "open": field_f64(day, "1. open")?,
                    "close": field_f64(day, "4. close")?,
                    "high": field_f64(day, "2. high")?,
                    "low": field_f64(day, "3. low")?,
                    "volume": field_f64(day, "5. volume")? as i64,
                }))
            })
            .collect();

        if prices.is_empty() {
            return Err("time series was empty".into());
        }

        Ok(json!({
            "symbol": symbol,
            "name": name,
            "prices": prices,
        }))
    }
}

#[async_trait]
impl Capability for StockCapability {
    fn kind(&self) -> ToolKind {
        ToolKind::Stock
    }

    fn description(&self) -> &str {
        "Query historical daily prices for a stock symbol"
    }

    fn required_params(&self) -> &'static [&'static str] {
        &["symbol"]
    }

    fn optional_params(&self) -> &'static [&'static str] {
        &["days"]
    }

    async fn invoke(&self, params: ParamMap) -> ToolEnvelope {
        let started = Instant::now();

        let Some(raw_symbol) = string_param(&params, "symbol").filter(|s| !s.trim().is_empty())
        else {
            return ToolEnvelope::failure(
                "stock",
                "invalid parameters: symbol must not be empty",
                started,
            );
        };
        let days = int_param(&params, "days").unwrap_or(5).clamp(1, 30) as usize;

        // A company name resolves to its ticker code first.
        let symbol = rules::stock_code_for_name(&raw_symbol)
            .map(str::to_string)
            .unwrap_or(raw_symbol);
        let name = rules::stock_name_for_code(&symbol);

        if let Some(key) = self.config.api_key.as_deref() {
            let is_us_symbol =
                symbol.chars().all(|c| c.is_ascii_alphabetic()) && (1..=5).contains(&symbol.len());
            if is_us_symbol {
                match self.fetch_alphavantage(key, &symbol, &name, days).await {
                    Ok(data) => {
                        return ToolEnvelope::ok_with(
                            ToolKind::Stock,
                            data,
                            started,
                            false,
                            Some("alphavantage"),
                        );
                    }
                    Err(e) => warn!(error = %e, "Alpha Vantage failed, falling back to mock prices"),
                }
            } else {
                debug!(symbol = %symbol, "Numeric symbol unsupported by Alpha Vantage, using mock prices");
            }
        }

        ToolEnvelope::ok_with(
            ToolKind::Stock,
            mock_prices(&symbol, &name, days),
            started,
            true,
            None,
        )
    }
}

fn field_f64(day: &serde_json::Value, key: &str) -> Option<f64> {
    day.get(key)?.as_str()?.parse().ok()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Deterministic mock price series with a slight upward drift.
fn mock_prices(symbol: &str, name: &str, days: usize) -> serde_json::Value {
    const BASE_PRICE: f64 = 100.0;
    let today = Utc::now().date_naive();

    let prices: Vec<serde_json::Value> = (0..days)
        .map(|i| {
            let date = (today - Duration::days((days - i - 1) as i64))
                .format("%Y-%m-%d")
                .to_string();
            let hash = det_hash(&format!("{symbol}_{date}_{i}"));

            let variation = (hash % 21) as f64 - 10.0;
            let close = BASE_PRICE + variation + (i as f64) * 0.5;
            let open = close - (hash % 3) as f64 - 0.5;
            let high = close + (hash % 2) as f64 + 1.0;
            let low = close - (hash % 3) as f64 - 1.0;
            let volume = 1_000_000 + (hash % 500_000) as i64;

            json!({
                "date": date,
                "open": round2(open),
                "close": round2(close),
                "high": round2(high),
                "low": round2(low),
                "volume": volume,
            })
        })
        .collect();

    json!({
        "symbol": symbol,
        "name": name,
        "prices": prices,
    })
}
