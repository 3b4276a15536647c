//! Document generation capability.
//!
//! Asks the language oracle to write the document (temperature 0.8, free
//! text); any oracle failure falls back to a deterministic mock document.
//! Chain context arrives through the optional `data` parameter and is
//! serialized into the prompt.

use async_trait::async_trait;
use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::error::OracleError;
use lingxi_core::oracle::{ChatMessage, Oracle, OracleRequest};
use lingxi_core::tool::{Capability, ParamMap, ToolKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct DocumentCapability {
    oracle: Arc<dyn Oracle>,
}

impl DocumentCapability {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    async fn generate(
        &self,
        template: &str,
        content: &str,
        data: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<String, OracleError> {
        let prompt = build_prompt(template, content, data);
        let request = OracleRequest::new(
            vec![
                ChatMessage::system(
                    "You are a professional document-writing assistant. \
                     Produce high-quality Markdown documents that follow the \
                     requested structure exactly.",
                ),
                ChatMessage::user(prompt),
            ],
            0.8,
        );
        self.oracle.chat(request).await
    }
}

#[async_trait]
impl Capability for DocumentCapability {
    fn kind(&self) -> ToolKind {
        ToolKind::Document
    }

    fn description(&self) -> &str {
        "Generate a report, email, or summary document"
    }

    fn required_params(&self) -> &'static [&'static str] {
        &["template", "content"]
    }

    fn optional_params(&self) -> &'static [&'static str] {
        &["data", "format"]
    }

    async fn invoke(&self, params: ParamMap) -> ToolEnvelope {
        let started = Instant::now();

        let template = params
            .get("template")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();
        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if template.is_empty() || content.is_empty() {
            return ToolEnvelope::failure(
                "document",
                "invalid parameters: template and content must not be empty",
                started,
            );
        }

        let data = params.get("data").and_then(|v| v.as_object());
        let format = params
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or("markdown");

        let (document, is_mock, provider) = match self.generate(&template, &content, data).await {
            Ok(text) => (text, false, Some("oracle")),
            Err(OracleError::NotConfigured(_)) => {
                debug!("Oracle not configured, using mock document");
                (mock_document(&template, &content), true, None)
            }
            Err(e) => {
                warn!(error = %e, "Document generation failed, using mock document");
                (mock_document(&template, &content), true, None)
            }
        };

        let word_count = document.chars().count();
        ToolEnvelope::ok_with(
            ToolKind::Document,
            json!({
                "content": document,
                "format": format,
                "word_count": word_count,
                "template": template,
            }),
            started,
            is_mock,
            provider,
        )
    }
}

fn template_label(template: &str) -> &'static str {
    match template {
        "report" => "report",
        "email" => "email",
        "summary" => "summary",
        _ => "document",
    }
}

fn build_prompt(
    template: &str,
    content: &str,
    data: Option<&serde_json::Map<String, serde_json::Value>>,
) -> String {
    let label = template_label(template);
    let mut prompt = format!("Please write a {label} with the following requirements:\n\n");
    prompt.push_str(&format!("Topic / content: {content}\n\n"));

    if let Some(data) = data.filter(|d| !d.is_empty()) {
        prompt.push_str("Context data:\n");
        for (key, value) in data {
            match value {
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    let pretty = serde_json::to_string_pretty(value).unwrap_or_default();
                    prompt.push_str(&format!("- {key}: {pretty}\n"));
                }
                other => prompt.push_str(&format!("- {key}: {other}\n")),
            }
        }
        prompt.push('\n');
    }

    match template {
        "report" => prompt.push_str(
            "Structure the report as:\n\
             1. Title\n\
             2. Overview / abstract\n\
             3. Main content, as bullet points\n\
             4. Conclusions / recommendations\n\n\
             Use Markdown. Keep it professional, clear, and well organized.",
        ),
        "email" => prompt.push_str(
            "Structure the email as:\n\
             1. Subject line\n\
             2. Salutation\n\
             3. Body, short and to the point\n\
             4. Sign-off\n\n\
             Use Markdown. Professional but friendly tone.",
        ),
        "summary" => prompt.push_str(
            "Write a concise summary:\n\
             1. Key points\n\
             2. Essential information\n\
             3. A brief conclusion\n\n\
             Use Markdown. Keep it tight and highlight what matters.",
        ),
        _ => prompt.push_str("Use Markdown. Keep it professional and clear."),
    }

    prompt
}

/// Deterministic fallback document for when the oracle is unavailable.
fn mock_document(template: &str, content: &str) -> String {
    let label = template_label(template);
    format!(
        "# {title}\n\n\
         ## Topic\n\n{content}\n\n\
         ## Content\n\n\
         This is a generated {label} based on \"{content}\".\n\n\
         ### Key points\n\n\
         1. Relevant findings\n\
         2. Supporting information\n\
         3. Suggested next steps\n\n\
         ### Conclusion\n\n\
         The above covers the requested {label} for \"{content}\".\n\n\
         ---\n\
         *Generated without an oracle backend; configure LLM_API_KEY for model-written documents.*\n",
        title = capitalize(label),
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingxi_core::error::OracleError;

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

    struct ScriptedOracle(String);

    #[async_trait]
    impl Oracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn chat(&self, _request: OracleRequest) -> Result<String, OracleError> {
            Ok(self.0.clone())
        }
    }

    fn params(template: &str, content: &str) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("template".into(), json!(template));
        params.insert("content".into(), json!(content));
        params
    }

    #[tokio::test]
    async fn missing_params_fail() {
        let cap = DocumentCapability::new(Arc::new(DisabledOracle));
        let envelope = cap.invoke(ParamMap::new()).await;
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_mock_without_oracle() {
        let cap = DocumentCapability::new(Arc::new(DisabledOracle));
        let envelope = cap.invoke(params("summary", "weekly progress")).await;
        assert!(envelope.success);
        assert!(envelope.metadata.is_mock);
        let data = envelope.data.unwrap();
        assert!(data["content"].as_str().unwrap().contains("weekly progress"));
        assert_eq!(data["template"], "summary");
        assert_eq!(data["format"], "markdown");
        assert!(data["word_count"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn uses_oracle_text_when_available() {
        let cap = DocumentCapability::new(Arc::new(ScriptedOracle("# Weekly Report\n...".into())));
        let envelope = cap.invoke(params("report", "weekly progress")).await;
        assert!(envelope.success);
        assert!(!envelope.metadata.is_mock);
        assert_eq!(envelope.metadata.provider.as_deref(), Some("oracle"));
        let data = envelope.data.unwrap();
        assert_eq!(data["content"], "# Weekly Report\n...");
    }

    #[test]
    fn prompt_includes_context_data() {
        let mut data = serde_json::Map::new();
        data.insert("forecast".into(), json!([{"date": "2024-01-01"}]));
        let prompt = build_prompt("summary", "weather overview", Some(&data));
        assert!(prompt.contains("Context data"));
        assert!(prompt.contains("forecast"));
        assert!(prompt.contains("2024-01-01"));
    }

    #[test]
    fn prompt_matches_template() {
        assert!(build_prompt("email", "hello", None).contains("Subject line"));
        assert!(build_prompt("report", "hello", None).contains("Conclusions"));
    }
}
