//! News capability.
//!
//! Provider order: NewsAPI `everything` search → deterministic mock. The
//! search language follows the query: CJK queries search Chinese sources,
//! ASCII queries English ones.

use crate::{det_hash, int_param, string_param};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lingxi_config::NewsConfig;
use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::tool::{Capability, ParamMap, ToolKind};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::warn;

const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";

pub struct NewsCapability {
    config: NewsConfig,
    client: reqwest::Client,
}

impl NewsCapability {
    pub fn new(config: NewsConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn fetch_newsapi(
        &self,
        key: &str,
        query: &str,
        limit: usize,
    ) -> Result<serde_json::Value, String> {
        let language = if query.chars().any(|c| c as u32 > 127) {
            "zh"
        } else {
            "en"
        };
        let limit_str = limit.to_string();

        let response = self
            .client
            .get(NEWSAPI_URL)
            .query(&[
                ("q", query),
                ("pageSize", limit_str.as_str()),
                ("sortBy", "publishedAt"),
                ("language", language),
                ("apiKey", key),
            ])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        match response.status().as_u16() {
            401 => return Err("API key rejected (HTTP 401)".into()),
            429 => return Err("request quota exceeded (HTTP 429)".into()),
            _ => {}
        }

        let body: NewsApiResponse = response
            .error_for_status()
            .map_err(|e| format!("bad status: {e}"))?
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        if body.status != "ok" {
            return Err(format!(
                "API returned status {}: {}",
                body.status,
                body.message.unwrap_or_default()
            ));
        }

        let articles: Vec<serde_json::Value> = body
            .articles
            .iter()
            .filter(|a| !a.title.is_empty() && !a.url.is_empty())
            .take(limit)
            .map(|a| {
                json!({
                    "title": a.title,
                    "source": a.source.name,
                    "url": a.url,
                    "publishedAt": format_published(&a.published_at),
                    "description": a.description,
                })
            })
            .collect();

        if articles.is_empty() {
            return Err("article list was empty".into());
        }

        Ok(json!({
            "articles": articles,
            "total": articles.len(),
            "totalResults": body.total_results,
        }))
    }
}

#[async_trait]
impl Capability for NewsCapability {
    fn kind(&self) -> ToolKind {
        ToolKind::News
    }

    fn description(&self) -> &str {
        "Search recent news articles by keyword"
    }

    fn required_params(&self) -> &'static [&'static str] {
        &["query"]
    }

    fn optional_params(&self) -> &'static [&'static str] {
        &["limit", "category"]
    }

    async fn invoke(&self, params: ParamMap) -> ToolEnvelope {
        let started = Instant::now();

        let Some(query) = string_param(&params, "query").filter(|s| !s.trim().is_empty()) else {
            return ToolEnvelope::failure(
                "news",
                "invalid parameters: query must not be empty",
                started,
            );
        };
        let limit = int_param(&params, "limit").unwrap_or(10).clamp(1, 50) as usize;

        if let Some(key) = self.config.api_key.as_deref() {
            match self.fetch_newsapi(key, &query, limit).await {
                Ok(data) => {
                    return ToolEnvelope::ok_with(
                        ToolKind::News,
                        data,
                        started,
                        false,
                        Some("newsapi"),
                    );
                }
                Err(e) => warn!(error = %e, "NewsAPI failed, falling back to mock articles"),
            }
        }

        ToolEnvelope::ok_with(ToolKind::News, mock_articles(&query, limit), started, true, None)
    }
}

/// Normalize an ISO 8601 timestamp to `YYYY-MM-DD HH:MM:SS`; anything
/// unparseable passes through unchanged.
fn format_published(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Topic-keyed headline templates for mock articles.
fn headline_templates(query: &str) -> &'static [(&'static str, &'static str)] {
    const AI: &[(&str, &str)] = &[
        ("OpenAI 发布最新 GPT 模型", "TechCrunch"),
        ("AI 技术在医疗领域取得突破", "Science Daily"),
        ("欧盟通过 AI 监管法案", "Reuters"),
    ];
    const TECH: &[(&str, &str)] = &[
        ("量子计算技术新突破", "科技日报"),
        ("5G 网络覆盖率达到新高度", "通信世界"),
        ("新能源汽车销量创新高", "汽车之家"),
    ];
    const FINANCE: &[(&str, &str)] = &[
        ("股市今日大幅上涨", "财经网"),
        ("央行发布最新货币政策", "第一财经"),
        ("房地产市场政策调整", "新浪财经"),
    ];

    let lower = query.to_lowercase();
    if lower.contains("ai") || lower.contains("人工智能") || lower.contains("大模型") {
        AI
    } else if lower.contains("科技") || lower.contains("技术") {
        TECH
    } else if lower.contains("财经") || lower.contains("经济") || lower.contains("股票") {
        FINANCE
    } else {
        AI
    }
}

/// Deterministic mock article list. Publish times are hash-derived rather
/// than random so identical parameters produce identical data.
fn mock_articles(query: &str, limit: usize) -> serde_json::Value {
    let templates = headline_templates(query);
    let today = Utc::now().date_naive();

    let articles: Vec<serde_json::Value> = (0..limit.min(templates.len()))
        .map(|i| {
            let (title, source) = templates[i % templates.len()];
            let hash = det_hash(&format!("{query}_{i}"));
            let day = today - Duration::days((hash % 3) as i64);
            let hour = hash % 24;

            json!({
                "title": title,
                "source": source,
                "url": format!("https://example.com/news/{}", i + 1),
                "publishedAt": format!("{} {:02}:00:00", day.format("%Y-%m-%d"), hour),
                "description": format!("这是关于 {query} 的新闻摘要，包含相关信息和最新动态。"),
            })
        })
        .collect();

    json!({
        "articles": articles,
        "total": articles.len(),
    })
}

// ── Provider wire types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "totalResults")]
    total_results: u64,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NewsApiArticle {
    title: String,
    url: String,
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
    source: NewsApiSource,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NewsApiSource {
    name: String,
}
