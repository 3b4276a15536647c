//! The display payload returned to the frontend.

use serde::{Deserialize, Serialize};

/// How the frontend should chart the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    None,
    Line,
}

/// The final merged payload for one request.
///
/// Built fresh per request from the executed envelopes; never mutated after
/// construction. Field names follow the frontend's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayResult {
    /// Human-readable narrative of what was done.
    pub summary: String,

    pub chart_type: ChartType,

    /// Ordered chart rows: `{name, ...numeric series fields}`.
    pub chart_data: Vec<serde_json::Value>,

    /// The underlying data — a list for most tools, a tagged breakdown
    /// array for merged multi-tool results.
    pub raw_data: serde_json::Value,
}

impl DisplayResult {
    /// A result with no chart and empty data.
    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            chart_type: ChartType::None,
            chart_data: Vec::new(),
            raw_data: serde_json::Value::Array(Vec::new()),
        }
    }

    /// The fixed failure payload: `execution failed: <error>`.
    pub fn failed(error: &str) -> Self {
        Self::text(format!("execution failed: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_camel_case() {
        let result = DisplayResult {
            summary: "ok".into(),
            chart_type: ChartType::Line,
            chart_data: vec![serde_json::json!({"name": "2024-01-01", "close": 100.0})],
            raw_data: serde_json::json!([]),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"chartType\":\"line\""));
        assert!(json.contains("\"chartData\""));
        assert!(json.contains("\"rawData\""));
    }

    #[test]
    fn failed_payload_is_empty_apart_from_summary() {
        let result = DisplayResult::failed("provider down");
        assert_eq!(result.summary, "execution failed: provider down");
        assert_eq!(result.chart_type, ChartType::None);
        assert!(result.chart_data.is_empty());
        assert_eq!(result.raw_data, serde_json::json!([]));
    }
}
