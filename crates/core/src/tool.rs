//! Tool identity, the Capability trait, and the registry.
//!
//! Every capability the orchestrator can invoke is identified by a
//! [`ToolKind`] — a closed tagged union. Raw names from the oracle or from
//! HTTP callers are converted exactly once, in [`ToolKind::parse`]; the
//! resolver, invoker, and aggregator all switch on the tag, never on
//! strings.

use crate::envelope::ToolEnvelope;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Parameter map passed to a capability invocation.
pub type ParamMap = serde_json::Map<String, serde_json::Value>;

/// The closed set of capabilities this service orchestrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Weather,
    News,
    Stock,
    Calculate,
    Document,
}

impl ToolKind {
    /// The single name→tag resolution point.
    ///
    /// Accepts the wire names used by the oracle prompt and HTTP callers;
    /// case-insensitive. Unknown names return `None` — callers decide
    /// whether that means an `Unresolved` plan or a not-found envelope.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "weather" => Some(Self::Weather),
            "news" => Some(Self::News),
            "stock" => Some(Self::Stock),
            "calculate" => Some(Self::Calculate),
            "document" => Some(Self::Document),
            _ => None,
        }
    }

    /// The canonical wire name of this tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::News => "news",
            Self::Stock => "stock",
            Self::Calculate => "calculate",
            Self::Document => "document",
        }
    }

    /// All tool kinds, in registry order.
    pub fn all() -> [ToolKind; 5] {
        [
            Self::Weather,
            Self::News,
            Self::Stock,
            Self::Calculate,
            Self::Document,
        ]
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read-only description of a registered capability.
///
/// Derived from the registry for prompt building and the tools-status
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub required_params: Vec<String>,
    pub optional_params: Vec<String>,
}

/// The core Capability trait.
///
/// Each capability (weather, news, stock, calculate, document) implements
/// this trait. Capabilities validate their own parameters and report every
/// failure through the envelope — `invoke` has no error channel by design.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Which tool this capability implements.
    fn kind(&self) -> ToolKind;

    /// A description of what this capability does (enumerated in the
    /// oracle prompt).
    fn description(&self) -> &str;

    /// Names of parameters that must be present.
    fn required_params(&self) -> &'static [&'static str];

    /// Names of parameters that may be present.
    fn optional_params(&self) -> &'static [&'static str];

    /// Execute the capability with the given parameters.
    ///
    /// Missing required parameters, provider failures, and anything else
    /// that goes wrong all come back as a failure envelope.
    async fn invoke(&self, params: ParamMap) -> ToolEnvelope;

    /// Convert this capability into a descriptor.
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.kind().as_str().to_string(),
            description: self.description().to_string(),
            required_params: self.required_params().iter().map(|s| s.to_string()).collect(),
            optional_params: self.optional_params().iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A registry of available capabilities.
///
/// Constructed once at process start, read-only thereafter, shared by all
/// concurrent requests via `Arc`. There is no ambient global lookup.
pub struct CapabilityRegistry {
    caps: HashMap<ToolKind, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            caps: HashMap::new(),
        }
    }

    /// Register a capability. Replaces any existing one for the same kind.
    pub fn register(&mut self, cap: Arc<dyn Capability>) {
        self.caps.insert(cap.kind(), cap);
    }

    /// Look up a capability by kind.
    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Capability>> {
        self.caps.get(&kind).cloned()
    }

    /// Descriptors for all registered capabilities, in registry order.
    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        ToolKind::all()
            .iter()
            .filter_map(|k| self.caps.get(k))
            .map(|c| c.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test capability.
    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn kind(&self) -> ToolKind {
            ToolKind::Calculate
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn required_params(&self) -> &'static [&'static str] {
            &["text"]
        }
        fn optional_params(&self) -> &'static [&'static str] {
            &[]
        }
        async fn invoke(&self, params: ParamMap) -> ToolEnvelope {
            let started = std::time::Instant::now();
            ToolEnvelope::ok(
                ToolKind::Calculate,
                serde_json::Value::Object(params),
                started,
            )
        }
    }

    #[test]
    fn parse_known_names() {
        assert_eq!(ToolKind::parse("weather"), Some(ToolKind::Weather));
        assert_eq!(ToolKind::parse("NEWS"), Some(ToolKind::News));
        assert_eq!(ToolKind::parse(" stock "), Some(ToolKind::Stock));
        assert_eq!(ToolKind::parse("calculate"), Some(ToolKind::Calculate));
        assert_eq!(ToolKind::parse("document"), Some(ToolKind::Document));
    }

    #[test]
    fn parse_unknown_name() {
        assert_eq!(ToolKind::parse("translate"), None);
        assert_eq!(ToolKind::parse(""), None);
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        assert!(registry.get(ToolKind::Calculate).is_some());
        assert!(registry.get(ToolKind::Weather).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_descriptors() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "calculate");
        assert_eq!(descriptors[0].required_params, vec!["text"]);
    }

    #[tokio::test]
    async fn capability_invoke_roundtrip() {
        let cap = EchoCapability;
        let mut params = ParamMap::new();
        params.insert("text".into(), serde_json::json!("hello"));
        let envelope = cap.invoke(params).await;
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap()["text"], "hello");
    }
}
