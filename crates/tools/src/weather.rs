//! Weather capability.
//!
//! Provider order: Seniverse daily forecast → QWeather 7-day forecast →
//! deterministic mock. Forecast rows use the frontend's field names
//! (`maxTemp`, `minTemp`, ...).

use crate::{det_hash, int_param, string_param};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use lingxi_config::WeatherConfig;
use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::tool::{Capability, ParamMap, ToolKind};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, warn};

const SENIVERSE_URL: &str = "https://api.seniverse.com/v3/weather/daily.json";
const QWEATHER_LOOKUP_URL: &str = "https://geoapi.qweather.com/v2/city/lookup";
const QWEATHER_FORECAST_URL: &str = "https://devapi.qweather.com/v7/weather/7d";

pub struct WeatherCapability {
    config: WeatherConfig,
    client: reqwest::Client,
}

impl WeatherCapability {
    pub fn new(config: WeatherConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn fetch_seniverse(
        &self,
        key: &str,
        location: &str,
        days: usize,
    ) -> Result<serde_json::Value, String> {
        let days_str = days.to_string();
        let response = self
            .client
            .get(SENIVERSE_URL)
            .query(&[
                ("key", key),
                ("location", location),
                ("language", "zh-Hans"),
                ("unit", "c"),
                ("start", "0"),
                ("days", days_str.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("bad status: {e}"))?;

        let body: SeniverseResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        let result = body
            .results
            .into_iter()
            .next()
            .ok_or("response contained no results")?;
        if result.daily.is_empty() {
            return Err("daily forecast was empty".into());
        }

        let forecast: Vec<serde_json::Value> = result
            .daily
            .iter()
            .take(days)
            .map(|day| {
                json!({
                    "date": day.date,
                    "weather": combine_day_night(&day.text_day, &day.text_night),
                    "maxTemp": parse_temp(&day.high),
                    "minTemp": parse_temp(&day.low),
                    "humidity": day.humidity.parse::<i64>().unwrap_or(50),
                    "wind": format!("{} {}级", day.wind_direction, day.wind_scale),
                })
            })
            .collect();

        Ok(json!({
            "location": result.location.name,
            "forecast": forecast,
        }))
    }

    async fn fetch_qweather(
        &self,
        key: &str,
        location: &str,
        days: usize,
    ) -> Result<serde_json::Value, String> {
        // City lookup first; fall back to the raw name if it fails.
        let (location_param, city_name) = match self.qweather_lookup(key, location).await {
            Ok(hit) => hit,
            Err(e) => {
                debug!(error = %e, "QWeather city lookup failed, querying by name");
                (location.to_string(), location.to_string())
            }
        };

        let response = self
            .client
            .get(QWEATHER_FORECAST_URL)
            .header("X-QW-Api-Key", key)
            .query(&[("location", location_param.as_str())])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(format!("API key rejected (HTTP {status})"));
        }
        let body: QWeatherForecastResponse = response
            .error_for_status()
            .map_err(|e| format!("bad status: {e}"))?
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        if body.code != "200" {
            return Err(format!("forecast query failed (code: {})", body.code));
        }
        if body.daily.is_empty() {
            return Err("daily forecast was empty".into());
        }

        let forecast: Vec<serde_json::Value> = body
            .daily
            .iter()
            .take(days)
            .map(|day| {
                json!({
                    "date": day.fx_date,
                    "weather": combine_day_night(&day.text_day, &day.text_night),
                    "maxTemp": day.temp_max.parse::<i64>().unwrap_or(0),
                    "minTemp": day.temp_min.parse::<i64>().unwrap_or(0),
                    "humidity": day.humidity.parse::<i64>().unwrap_or(0),
                    "wind": format!("{} {}级", day.wind_dir_day, day.wind_scale_day),
                })
            })
            .collect();

        Ok(json!({
            "location": city_name,
            "forecast": forecast,
        }))
    }

    async fn qweather_lookup(&self, key: &str, location: &str) -> Result<(String, String), String> {
        let response = self
            .client
            .get(QWEATHER_LOOKUP_URL)
            .header("X-QW-Api-Key", key)
            .query(&[("location", location)])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("bad status: {e}"))?;

        let body: QWeatherLookupResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        if body.code != "200" {
            return Err(format!("lookup failed (code: {})", body.code));
        }
        body.location
            .into_iter()
            .next()
            .map(|city| (city.id, city.name))
            .ok_or_else(|| "no city matched".into())
    }
}

#[async_trait]
impl Capability for WeatherCapability {
    fn kind(&self) -> ToolKind {
        ToolKind::Weather
    }

    fn description(&self) -> &str {
        "Query the weather forecast for a city, up to 7 days ahead"
    }

    fn required_params(&self) -> &'static [&'static str] {
        &["location"]
    }

    fn optional_params(&self) -> &'static [&'static str] {
        &["days"]
    }

    async fn invoke(&self, params: ParamMap) -> ToolEnvelope {
        let started = Instant::now();

        let Some(location) = string_param(&params, "location").filter(|s| !s.trim().is_empty())
        else {
            return ToolEnvelope::failure(
                "weather",
                "invalid parameters: location must not be empty",
                started,
            );
        };
        let days = int_param(&params, "days").unwrap_or(7).clamp(1, 7) as usize;

        if let (Some(_uid), Some(key)) = (
            self.config.seniverse_uid.as_deref(),
            self.config.seniverse_key.as_deref(),
        ) {
            match self.fetch_seniverse(key, &location, days).await {
                Ok(data) => {
                    return ToolEnvelope::ok_with(
                        ToolKind::Weather,
                        data,
                        started,
                        false,
                        Some("seniverse"),
                    );
                }
                Err(e) => warn!(error = %e, "Seniverse failed, trying next weather provider"),
            }
        }

        if let Some(key) = self.config.qweather_key.as_deref() {
            match self.fetch_qweather(key, &location, days).await {
                Ok(data) => {
                    return ToolEnvelope::ok_with(
                        ToolKind::Weather,
                        data,
                        started,
                        false,
                        Some("qweather"),
                    );
                }
                Err(e) => warn!(error = %e, "QWeather failed, falling back to mock forecast"),
            }
        }

        ToolEnvelope::ok_with(
            ToolKind::Weather,
            mock_forecast(&location, days),
            started,
            true,
            None,
        )
    }
}

fn combine_day_night(day: &str, night: &str) -> String {
    if day == night {
        day.to_string()
    } else {
        format!("{day}转{night}")
    }
}

/// Parse a temperature that may arrive as `"15"`, `"15°C"` or `"15℃"`.
fn parse_temp(raw: &str) -> i64 {
    let cleaned = raw
        .replace("°C", "")
        .replace('℃', "")
        .replace('°', "")
        .trim()
        .to_string();
    cleaned
        .parse::<f64>()
        .map(|t| t.round() as i64)
        .unwrap_or(0)
}

/// Winter base temperatures per city, so mock data looks plausible.
fn base_temp(location: &str) -> i64 {
    match location {
        "北京" => 2,
        "上海" => 8,
        "广州" => 18,
        "深圳" => 19,
        "杭州" => 6,
        "南京" => 4,
        "成都" => 7,
        "武汉" => 5,
        "西安" => 2,
        "天津" => 1,
        "重庆" => 9,
        "苏州" => 6,
        "长沙" => 7,
        "郑州" => 3,
        "青岛" => 2,
        "大连" => -1,
        "济南" => 2,
        "福州" => 13,
        "厦门" => 15,
        "合肥" => 4,
        "石家庄" => 1,
        "哈尔滨" => -18,
        "长春" => -15,
        "沈阳" => -10,
        _ => 5,
    }
}

/// Deterministic mock forecast: hash of city + date + index drives every
/// field, so identical parameters produce identical data.
fn mock_forecast(location: &str, days: usize) -> serde_json::Value {
    const WEATHER_TYPES: [&str; 5] = ["Sunny", "Cloudy", "Rainy", "Partly Cloudy", "Foggy"];
    const WIND_DIRECTIONS: [&str; 8] = [
        "North",
        "South",
        "East",
        "West",
        "Northeast",
        "Southwest",
        "Northwest",
        "Southeast",
    ];

    let base = base_temp(location);
    let today = Utc::now().date_naive();

    let forecast: Vec<serde_json::Value> = (0..days)
        .map(|i| {
            let date = (today + Duration::days(i as i64)).format("%Y-%m-%d").to_string();
            let hash = det_hash(&format!("{location}_{date}_{i}"));

            let max_temp = base + (hash % 11) as i64 - 5;
            let min_temp = max_temp - ((hash % 8) as i64 + 3);
            let humidity = 40 + (hash % 41) as i64;
            let weather = WEATHER_TYPES[(hash as usize) % WEATHER_TYPES.len()];
            let wind_dir = WIND_DIRECTIONS[(hash as usize) % WIND_DIRECTIONS.len()];
            let wind_speed = 2 + (hash % 4);

            json!({
                "date": date,
                "weather": weather,
                "maxTemp": max_temp,
                "minTemp": min_temp,
                "humidity": humidity,
                "wind": format!("{wind_dir} {wind_speed}"),
            })
        })
        .collect();

    json!({
        "location": location,
        "forecast": forecast,
    })
}

// ── Provider wire types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct SeniverseResponse {
    #[serde(default)]
    results: Vec<SeniverseResult>,
}

#[derive(Deserialize)]
struct SeniverseResult {
    location: SeniverseLocation,
    #[serde(default)]
    daily: Vec<SeniverseDaily>,
}

#[derive(Deserialize)]
struct SeniverseLocation {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SeniverseDaily {
    date: String,
    text_day: String,
    text_night: String,
    high: String,
    low: String,
    humidity: String,
    wind_direction: String,
    wind_scale: String,
}

#[derive(Deserialize)]
struct QWeatherLookupResponse {
    code: String,
    #[serde(default)]
    location: Vec<QWeatherCity>,
}

#[derive(Deserialize)]
struct QWeatherCity {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct QWeatherForecastResponse {
    code: String,
    #[serde(default)]
    daily: Vec<QWeatherDaily>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct QWeatherDaily {
    fx_date: String,
    temp_max: String,
    temp_min: String,
    text_day: String,
    text_night: String,
    humidity: String,
    wind_dir_day: String,
    wind_scale_day: String,
}
