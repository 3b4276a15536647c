//! Capability implementations for lingxi.
//!
//! Each capability is a thin client over one or more external providers
//! with a deterministic mock as the final fallback, so the whole pipeline
//! works end-to-end without any credentials configured. Provider order is
//! fixed per capability; whichever strategy produced the data is recorded
//! in the envelope metadata (`is_mock`, `provider`) — downstream code reads
//! the flag, it never infers it.

pub mod calculate;
pub mod document;
pub mod news;
pub mod stock;
pub mod weather;

use lingxi_config::AppConfig;
use lingxi_core::oracle::Oracle;
use lingxi_core::tool::{CapabilityRegistry, ParamMap};
use std::sync::Arc;
use std::time::Duration;

/// Create the default capability registry with all five capabilities.
///
/// Built once at process start; the returned registry is immutable and
/// shared by reference.
pub fn default_registry(config: &AppConfig, oracle: Arc<dyn Oracle>) -> CapabilityRegistry {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.tools.timeout_secs))
        .build()
        .expect("Failed to create HTTP client");

    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(weather::WeatherCapability::new(
        config.weather.clone(),
        client.clone(),
    )));
    registry.register(Arc::new(news::NewsCapability::new(
        config.news.clone(),
        client.clone(),
    )));
    registry.register(Arc::new(stock::StockCapability::new(
        config.stock.clone(),
        client,
    )));
    registry.register(Arc::new(calculate::CalculateCapability));
    registry.register(Arc::new(document::DocumentCapability::new(oracle)));
    registry
}

/// Deterministic hash used by the mock generators: same input, same data,
/// across processes and runs.
pub(crate) fn det_hash(input: &str) -> u32 {
    input
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

/// Read a string parameter.
pub(crate) fn string_param(params: &ParamMap, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Read an integer parameter; accepts JSON numbers and numeric strings
/// (oracles are not reliable about which one they emit).
pub(crate) fn int_param(params: &ParamMap, key: &str) -> Option<i64> {
    match params.get(key)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingxi_core::error::OracleError;
    use lingxi_core::oracle::OracleRequest;
    use lingxi_core::tool::ToolKind;

    struct DisabledOracle;

    #[async_trait::async_trait]
    impl Oracle for DisabledOracle {
        fn name(&self) -> &str {
            "disabled"
        }
        async fn chat(&self, _request: OracleRequest) -> Result<String, OracleError> {
            Err(OracleError::NotConfigured("no key".into()))
        }
    }

    #[test]
    fn registry_contains_all_capabilities() {
        let registry = default_registry(&AppConfig::default(), Arc::new(DisabledOracle));
        assert_eq!(registry.len(), 5);
        for kind in ToolKind::all() {
            assert!(registry.get(kind).is_some(), "missing {kind}");
        }
    }

    #[test]
    fn det_hash_is_stable() {
        assert_eq!(det_hash("北京_2024-01-01_0"), det_hash("北京_2024-01-01_0"));
        assert_ne!(det_hash("北京_2024-01-01_0"), det_hash("上海_2024-01-01_0"));
    }

    #[test]
    fn int_param_accepts_numeric_strings() {
        let mut params = ParamMap::new();
        params.insert("days".into(), serde_json::json!("5"));
        params.insert("limit".into(), serde_json::json!(10));
        assert_eq!(int_param(&params, "days"), Some(5));
        assert_eq!(int_param(&params, "limit"), Some(10));
        assert_eq!(int_param(&params, "missing"), None);
    }
}
