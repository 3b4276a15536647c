//! Result aggregation: envelopes in, one display payload out.
//!
//! Single-step results dispatch on tool identity to one fixed
//! transformation each. Multi-step results are merged by a finite
//! enumeration of first-tool/last-tool pairings — the exact combinations
//! the frontend knows how to render. Chains outside the enumeration fall
//! back to the last successful step rendered as a sole result; this is a
//! deliberate scope limit, not a general merge algorithm.

use crate::executor::{ChainOutcome, ExecutedStep};
use lingxi_core::display::{ChartType, DisplayResult};
use lingxi_core::tool::ToolKind;
use serde_json::{Value, json};

/// Aggregate an executed chain into the final display payload.
pub fn aggregate(user_input: &str, outcome: &ChainOutcome) -> DisplayResult {
    if outcome.steps.is_empty() {
        return unresolved(user_input);
    }
    if outcome.steps.len() == 1 {
        return single(&outcome.steps[0]);
    }
    merge(outcome)
}

/// Fixed help text for input that matched no capability.
fn unresolved(user_input: &str) -> DisplayResult {
    DisplayResult::text(format!(
        "Sorry, I could not understand the request: \"{user_input}\".\n\n\
         I can help with:\n\
         - Weather lookups (e.g. 查北京天气)\n\
         - News searches (e.g. 查AI新闻)\n\
         - Stock queries (e.g. 查贵州茅台股票)\n\
         - Calculations (e.g. 计算 2+3)\n\
         - Document generation (e.g. 写一份报告)"
    ))
}

/// One fixed transformation per tool.
fn single(step: &ExecutedStep) -> DisplayResult {
    if !step.envelope.success {
        return DisplayResult::failed(
            step.envelope.error.as_deref().unwrap_or("unknown error"),
        );
    }

    match step.tool {
        ToolKind::Weather => {
            let forecast = data_array(step, "forecast");
            let location = weather_location(step);
            let days = step_days(step, forecast.len());
            DisplayResult {
                summary: format!(
                    "Queried the {days}-day forecast for {location}. Temperatures \
                     fluctuate across the period; plan outings accordingly."
                ),
                chart_type: ChartType::Line,
                chart_data: weather_chart(&forecast),
                raw_data: Value::Array(forecast),
            }
        }
        ToolKind::News => {
            let articles = data_array(step, "articles");
            let query = param_str(step, "query").unwrap_or_default();
            DisplayResult {
                summary: format!(
                    "Fetched {} recent article(s) about \"{query}\".",
                    articles.len()
                ),
                chart_type: ChartType::None,
                chart_data: Vec::new(),
                raw_data: Value::Array(articles),
            }
        }
        ToolKind::Stock => {
            let prices = data_array(step, "prices");
            let symbol = data_str(step, "symbol")
                .or_else(|| param_str(step, "symbol"))
                .unwrap_or_default();
            let name = data_str(step, "name").unwrap_or_default();
            DisplayResult {
                summary: format!(
                    "Stock {symbol} ({name}): retrieved {} day(s) of price history.",
                    prices.len()
                ),
                chart_type: ChartType::Line,
                chart_data: stock_chart(&prices),
                raw_data: Value::Array(prices),
            }
        }
        ToolKind::Calculate => {
            let expression = data_str(step, "expression")
                .or_else(|| param_str(step, "expression"))
                .unwrap_or_default();
            let result = step
                .envelope
                .data
                .as_ref()
                .and_then(|d| d.get("result"))
                .cloned()
                .unwrap_or(Value::Null);
            DisplayResult {
                summary: format!("{expression} = {result}"),
                chart_type: ChartType::None,
                chart_data: Vec::new(),
                raw_data: json!([{"expression": expression, "result": result}]),
            }
        }
        ToolKind::Document => {
            let content = data_str(step, "content").unwrap_or_default();
            let template = data_str(step, "template").unwrap_or_else(|| "document".into());
            let format = data_str(step, "format").unwrap_or_else(|| "markdown".into());
            let word_count = step
                .envelope
                .data
                .as_ref()
                .and_then(|d| d.get("word_count"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            DisplayResult {
                summary: format!(
                    "Generated a {template} document, {word_count} characters.\n\n\
                     Document content:\n{content}"
                ),
                chart_type: ChartType::None,
                chart_data: Vec::new(),
                raw_data: json!([{"content": content, "format": format, "template": template}]),
            }
        }
    }
}

/// The enumerated multi-step pairings, keyed on (first tool, last tool).
fn merge(outcome: &ChainOutcome) -> DisplayResult {
    let first = &outcome.steps[0];
    let last = &outcome.steps[outcome.steps.len() - 1];

    if first.envelope.success && last.envelope.success {
        match (first.tool, last.tool) {
            (ToolKind::Weather, ToolKind::Stock) => return merge_weather_stock(first, last),
            (ToolKind::Weather, ToolKind::Document) => return merge_weather_document(first, last),
            (ToolKind::News, ToolKind::Stock) => return merge_news_stock(first, last),
            (ToolKind::News, ToolKind::Document) => return merge_news_document(first, last),
            (ToolKind::Stock, ToolKind::Weather) => return merge_stock_weather(first, last),
            (ToolKind::Stock, ToolKind::Document) => return merge_stock_document(first, last),
            _ => {}
        }
    }

    // Outside the enumeration (or a failed endpoint): the last successful
    // step stands in as the sole result.
    match outcome.last_successful() {
        Some(step) => single(step),
        None => DisplayResult::failed(
            last.envelope.error.as_deref().unwrap_or("all chain steps failed"),
        ),
    }
}

fn merge_weather_stock(first: &ExecutedStep, last: &ExecutedStep) -> DisplayResult {
    let forecast = data_array(first, "forecast");
    let location = weather_location(first);
    let days = step_days(first, forecast.len());
    let chart = weather_chart(&forecast);

    let prices = data_array(last, "prices");
    let symbol = data_str(last, "symbol").unwrap_or_default();
    let name = data_str(last, "name").unwrap_or_default();
    let stock_chart_data = stock_chart(&prices);

    DisplayResult {
        summary: format!(
            "Queried the {days}-day forecast for {location}.\n\n\
             Queried {name} ({symbol}) stock data, {} day(s).",
            prices.len()
        ),
        chart_type: ChartType::Line,
        chart_data: chart.clone(),
        raw_data: json!([
            {
                "type": "weather",
                "title": format!("Weather data for {location}"),
                "data": forecast,
                "chartType": "line",
                "chartData": chart,
            },
            {
                "type": "stock",
                "title": format!("Stock data for {name} ({symbol})"),
                "data": prices,
                "chartType": "line",
                "chartData": stock_chart_data,
            },
        ]),
    }
}

fn merge_weather_document(first: &ExecutedStep, last: &ExecutedStep) -> DisplayResult {
    let forecast = data_array(first, "forecast");
    let location = weather_location(first);
    let days = step_days(first, forecast.len());
    let document = data_str(last, "content").unwrap_or_default();

    // The document content is inlined in the summary; raw data reverts to
    // the weather series the frontend charts.
    DisplayResult {
        summary: format!(
            "Queried the {days}-day forecast for {location} and generated a guide.\n\n\
             ## Weather\n\nForecast for {location} over the next {days} day(s).\n\n\
             ## Guide\n\n{document}"
        ),
        chart_type: ChartType::Line,
        chart_data: weather_chart(&forecast),
        raw_data: Value::Array(forecast),
    }
}

fn merge_news_stock(first: &ExecutedStep, last: &ExecutedStep) -> DisplayResult {
    let articles = data_array(first, "articles");
    let query = param_str(first, "query").unwrap_or_default();

    let prices = data_array(last, "prices");
    let symbol = data_str(last, "symbol").unwrap_or_default();
    let name = data_str(last, "name").unwrap_or_default();
    let stock_chart_data = stock_chart(&prices);

    DisplayResult {
        summary: format!(
            "Fetched {} recent article(s) about \"{query}\".\n\n\
             Queried {name} ({symbol}) stock data, {} day(s).",
            articles.len(),
            prices.len()
        ),
        chart_type: ChartType::Line,
        chart_data: stock_chart_data.clone(),
        raw_data: json!([
            {
                "type": "news",
                "title": format!("News results for \"{query}\""),
                "data": articles,
                "chartType": "none",
                "chartData": [],
            },
            {
                "type": "stock",
                "title": format!("Stock data for {name} ({symbol})"),
                "data": prices,
                "chartType": "line",
                "chartData": stock_chart_data,
            },
        ]),
    }
}

fn merge_news_document(first: &ExecutedStep, last: &ExecutedStep) -> DisplayResult {
    let articles = data_array(first, "articles");
    let query = param_str(first, "query").unwrap_or_default();
    let document = data_str(last, "content").unwrap_or_default();

    DisplayResult {
        summary: format!(
            "Fetched {} recent article(s) about \"{query}\" and generated a summary.\n\n\
             ## News summary\n\n{document}",
            articles.len()
        ),
        chart_type: ChartType::None,
        chart_data: Vec::new(),
        raw_data: Value::Array(articles),
    }
}

fn merge_stock_weather(first: &ExecutedStep, last: &ExecutedStep) -> DisplayResult {
    let prices = data_array(first, "prices");
    let symbol = data_str(first, "symbol").unwrap_or_default();
    let name = data_str(first, "name").unwrap_or_default();
    let chart = stock_chart(&prices);

    let forecast = data_array(last, "forecast");
    let location = weather_location(last);
    let weather_chart_data = weather_chart(&forecast);

    DisplayResult {
        summary: format!(
            "Queried {name} ({symbol}) stock data, {} day(s).\n\n\
             Queried the {}-day forecast for {location}.",
            prices.len(),
            forecast.len()
        ),
        chart_type: ChartType::Line,
        chart_data: chart.clone(),
        raw_data: json!([
            {
                "type": "stock",
                "title": format!("Stock data for {name} ({symbol})"),
                "data": prices,
                "chartType": "line",
                "chartData": chart,
            },
            {
                "type": "weather",
                "title": format!("Weather data for {location}"),
                "data": forecast,
                "chartType": "line",
                "chartData": weather_chart_data,
            },
        ]),
    }
}

fn merge_stock_document(first: &ExecutedStep, last: &ExecutedStep) -> DisplayResult {
    let prices = data_array(first, "prices");
    let document = data_str(last, "content").unwrap_or_default();

    DisplayResult {
        summary: format!(
            "Queried stock data and generated an analysis.\n\n\
             ## Stock analysis\n\n{document}"
        ),
        chart_type: ChartType::Line,
        chart_data: stock_chart(&prices),
        raw_data: Value::Array(prices),
    }
}

// ── Data extraction helpers ───────────────────────────────────────────────

fn data_array(step: &ExecutedStep, key: &str) -> Vec<Value> {
    step.envelope
        .data_object()
        .and_then(|d| d.get(key))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn data_str(step: &ExecutedStep, key: &str) -> Option<String> {
    step.envelope
        .data_object()
        .and_then(|d| d.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn param_str(step: &ExecutedStep, key: &str) -> Option<String> {
    step.parameters
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn weather_location(step: &ExecutedStep) -> String {
    data_str(step, "location")
        .or_else(|| param_str(step, "location"))
        .unwrap_or_else(|| "北京".into())
}

fn step_days(step: &ExecutedStep, fallback: usize) -> i64 {
    step.parameters
        .get("days")
        .and_then(|v| v.as_i64())
        .unwrap_or(fallback as i64)
}

/// Chart rows for a weather forecast: `{name, temperature, humidity}`.
fn weather_chart(forecast: &[Value]) -> Vec<Value> {
    forecast
        .iter()
        .map(|day| {
            json!({
                "name": day.get("date").cloned().unwrap_or_default(),
                "temperature": day.get("maxTemp").cloned().unwrap_or_default(),
                "humidity": day.get("humidity").cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// Chart rows for a price series: `{name, close, volume}`.
fn stock_chart(prices: &[Value]) -> Vec<Value> {
    prices
        .iter()
        .map(|day| {
            json!({
                "name": day.get("date").cloned().unwrap_or_default(),
                "close": day.get("close").cloned().unwrap_or_default(),
                "volume": day.get("volume").cloned().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ChainExecutor;
    use async_trait::async_trait;
    use lingxi_core::error::OracleError;
    use lingxi_core::oracle::{Oracle, OracleRequest};
    use lingxi_core::plan::{Plan, PlanStep};
    use std::sync::Arc;

    struct DisabledOracle;

    #[async_trait]
    impl Oracle for DisabledOracle {
        fn name(&self) -> &str {
            "disabled"
        }
        async fn chat(&self, _request: OracleRequest) -> Result<String, OracleError> {
            Err(OracleError::NotConfigured("no key".into()))
        }
    }

    fn executor() -> ChainExecutor {
        let registry = lingxi_tools::default_registry(
            &lingxi_config::AppConfig::default(),
            Arc::new(DisabledOracle),
        );
        ChainExecutor::new(Arc::new(registry))
    }

    fn step(tool: ToolKind, params: Value) -> PlanStep {
        PlanStep::new(tool, params.as_object().cloned().unwrap_or_default())
    }

    async fn run(plan: Plan) -> ChainOutcome {
        executor().run(&plan).await
    }

    #[tokio::test]
    async fn unresolved_names_the_input() {
        let result = aggregate("帮我订机票", &ChainOutcome::default());
        assert!(result.summary.contains("帮我订机票"));
        assert_eq!(result.chart_type, ChartType::None);
        assert_eq!(result.raw_data, json!([]));
    }

    #[tokio::test]
    async fn single_weather_renders_line_chart() {
        let outcome = run(Plan::Single(step(
            ToolKind::Weather,
            json!({"location": "北京", "days": 3}),
        )))
        .await;
        let result = aggregate("查北京天气", &outcome);

        assert_eq!(result.chart_type, ChartType::Line);
        assert_eq!(result.chart_data.len(), 3);
        assert!(result.chart_data[0].get("temperature").is_some());
        assert!(result.chart_data[0].get("humidity").is_some());
        assert!(result.summary.contains("北京"));
        assert!(result.summary.contains('3'));
        assert_eq!(result.raw_data.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn single_calculate_formats_equation() {
        let outcome = run(Plan::Single(step(
            ToolKind::Calculate,
            json!({"expression": "2+3*4"}),
        )))
        .await;
        let result = aggregate("计算 2+3*4", &outcome);
        assert_eq!(result.summary, "2+3*4 = 14");
        assert_eq!(result.raw_data[0]["result"], 14);
    }

    #[tokio::test]
    async fn single_news_has_no_chart() {
        let outcome = run(Plan::Single(step(
            ToolKind::News,
            json!({"query": "AI", "limit": 3}),
        )))
        .await;
        let result = aggregate("查AI新闻", &outcome);
        assert_eq!(result.chart_type, ChartType::None);
        assert!(result.summary.contains("AI"));
        assert!(!result.raw_data.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_document_inlines_content() {
        let outcome = run(Plan::Single(step(
            ToolKind::Document,
            json!({"template": "summary", "content": "weekly progress"}),
        )))
        .await;
        let result = aggregate("写总结", &outcome);
        assert!(result.summary.contains("summary document"));
        assert!(result.summary.contains("weekly progress"));
        assert_eq!(result.raw_data[0]["template"], "summary");
    }

    #[tokio::test]
    async fn single_failure_reports_error() {
        let outcome = run(Plan::Single(step(ToolKind::Weather, json!({})))).await;
        let result = aggregate("天气", &outcome);
        assert!(result.summary.starts_with("execution failed:"));
        assert_eq!(result.chart_type, ChartType::None);
        assert!(result.chart_data.is_empty());
    }

    #[tokio::test]
    async fn weather_stock_merge_is_two_entry_breakdown() {
        let outcome = run(Plan::Chain(vec![
            step(ToolKind::Weather, json!({"location": "北京", "days": 3})),
            step(ToolKind::Stock, json!({"symbol": "000001", "days": 5})),
        ]))
        .await;
        let result = aggregate("查北京天气和平安银行股票", &outcome);

        assert_eq!(result.chart_type, ChartType::Line);
        // Chart shows the first tool's (weather) series.
        assert_eq!(result.chart_data.len(), 3);
        // Raw data is the tagged two-entry breakdown.
        let raw = result.raw_data.as_array().unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0]["type"], "weather");
        assert_eq!(raw[1]["type"], "stock");
        assert_eq!(raw[1]["chartData"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn weather_document_merge_folds_content_into_summary() {
        let outcome = run(Plan::Chain(vec![
            step(ToolKind::Weather, json!({"location": "上海", "days": 2})),
            step(
                ToolKind::Document,
                json!({"template": "summary", "content": "出行建议"}),
            ),
        ]))
        .await;
        let result = aggregate("查上海天气并写出行建议", &outcome);

        assert_eq!(result.chart_type, ChartType::Line);
        assert!(result.summary.contains("## Guide"));
        // Raw data reverts to the weather series.
        let raw = result.raw_data.as_array().unwrap();
        assert_eq!(raw.len(), 2);
        assert!(raw[0].get("maxTemp").is_some());
    }

    #[tokio::test]
    async fn news_stock_merge_charts_the_stock_series() {
        let outcome = run(Plan::Chain(vec![
            step(ToolKind::News, json!({"query": "财经", "limit": 3})),
            step(ToolKind::Stock, json!({"symbol": "600519", "days": 4})),
        ]))
        .await;
        let result = aggregate("查财经新闻和茅台股票", &outcome);

        assert_eq!(result.chart_type, ChartType::Line);
        assert_eq!(result.chart_data.len(), 4);
        assert!(result.chart_data[0].get("close").is_some());
        let raw = result.raw_data.as_array().unwrap();
        assert_eq!(raw[0]["type"], "news");
        assert_eq!(raw[0]["chartType"], "none");
    }

    #[tokio::test]
    async fn unlisted_pair_uses_last_successful_step() {
        let outcome = run(Plan::Chain(vec![
            step(ToolKind::Calculate, json!({"expression": "1+1"})),
            step(ToolKind::Stock, json!({"symbol": "000001", "days": 5})),
        ]))
        .await;
        let result = aggregate("算1+1再查股票", &outcome);
        // Rendered as if the stock step were the sole result.
        assert_eq!(result.chart_type, ChartType::Line);
        assert!(result.summary.contains("000001"));
    }

    #[tokio::test]
    async fn failed_tail_falls_back_to_last_successful() {
        let outcome = run(Plan::Chain(vec![
            step(ToolKind::Weather, json!({"location": "北京", "days": 3})),
            step(ToolKind::Document, json!({})), // fails validation
        ]))
        .await;
        let result = aggregate("查天气写总结", &outcome);
        // The weather step stands in as the sole result.
        assert_eq!(result.chart_type, ChartType::Line);
        assert_eq!(result.chart_data.len(), 3);
    }

    #[tokio::test]
    async fn all_failed_chain_reports_failure() {
        let outcome = run(Plan::Chain(vec![
            step(ToolKind::Weather, json!({})),
            step(ToolKind::Document, json!({})),
        ]))
        .await;
        let result = aggregate("无效", &outcome);
        assert!(result.summary.starts_with("execution failed:"));
    }
}
