//! Intent resolution: free text in, `Plan` out.
//!
//! The resolver asks the oracle for a structured tool selection; when the
//! oracle is unreachable, unconfigured, or returns unusable text, it falls
//! through to the deterministic rule engine. Parameter post-processing is
//! identical regardless of which path produced the intent.
//!
//! `resolve` never errors: input that matches nothing yields
//! `Plan::Unresolved`.

use lingxi_core::oracle::{ChatMessage, Oracle, OracleRequest};
use lingxi_core::plan::{Plan, PlanStep};
use lingxi_core::tool::{CapabilityRegistry, ParamMap, ToolKind};
use lingxi_oracle::rules;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Temperature for intent resolution — low, we want determinism.
const RESOLVE_TEMPERATURE: f32 = 0.3;

pub struct IntentResolver {
    oracle: Arc<dyn Oracle>,
    registry: Arc<CapabilityRegistry>,
    max_chain_steps: usize,
}

impl IntentResolver {
    pub fn new(oracle: Arc<dyn Oracle>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            oracle,
            registry,
            max_chain_steps: 4,
        }
    }

    /// Cap the number of steps an oracle-produced chain may declare.
    pub fn with_max_chain_steps(mut self, max: usize) -> Self {
        self.max_chain_steps = max.max(1);
        self
    }

    /// Resolve a request into a plan.
    pub async fn resolve(&self, user_input: &str) -> Plan {
        let request = OracleRequest::new(
            vec![
                ChatMessage::system(
                    "You are an intelligent orchestration assistant that analyses \
                     user requests and selects the right tools. Always answer with \
                     a single JSON object.",
                ),
                ChatMessage::user(self.build_prompt(user_input)),
            ],
            RESOLVE_TEMPERATURE,
        )
        .json();

        let plan = match self.oracle.chat(request).await {
            Ok(raw) => match crate::extract::extract_intent_json(&raw) {
                Some(value) => self.plan_from_value(value, user_input),
                None => {
                    warn!("Oracle text contained no usable JSON, falling back to rules");
                    self.rules_plan(user_input)
                }
            },
            Err(e) => {
                info!(error = %e, "Oracle unavailable, falling back to rules");
                self.rules_plan(user_input)
            }
        };

        self.apply_calculate_override(plan, user_input)
    }

    /// The fixed instruction prompt: every registered capability, its
    /// parameters, and the two accepted output shapes.
    pub fn build_prompt(&self, user_input: &str) -> String {
        let mut prompt = String::from(
            "You are an assistant that analyses a user request and selects the \
             right tools.\n\nAvailable tools:\n",
        );

        for (i, descriptor) in self.registry.descriptors().iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} - {}\n   - parameters: {}{}\n",
                i + 1,
                descriptor.name,
                descriptor.description,
                join_params(&descriptor.required_params, "required"),
                if descriptor.optional_params.is_empty() {
                    String::new()
                } else {
                    format!(", {}", join_params(&descriptor.optional_params, "optional"))
                },
            ));
        }

        prompt.push_str(&format!(
            "\nAnalyse the user request below and return a JSON tool invocation \
             instruction.\n\nUser request: {user_input}\n\n\
             Important:\n\
             1. If the request contains several tasks (e.g. \"check the weather and \
             write a summary\"), identify all required tools and return them in \
             execution order.\n\
             2. If the request contains an arithmetic expression, prefer the \
             calculate tool.\n\
             3. Requests asking for a summary or report usually need a data tool \
             first (weather/news/stock), then the document tool.\n\
             4. Return exactly one JSON object and nothing else — no explanations, \
             no markdown fences.\n\n\
             Response format, single tool:\n\
             {{\"tool\": \"weather\", \"parameters\": {{\"location\": \"北京\", \"days\": 7}}, \"reasoning\": \"...\"}}\n\n\
             Response format, multiple tools in order:\n\
             {{\"tools\": [{{\"tool\": \"weather\", \"parameters\": {{...}}}}, {{\"tool\": \"document\", \"parameters\": {{...}}}}], \"reasoning\": \"...\"}}\n\n\
             If no tool fits:\n\
             {{\"tool\": null, \"reasoning\": \"...\"}}\n",
        ));

        prompt
    }

    /// Turn extracted oracle JSON into a plan.
    fn plan_from_value(&self, value: serde_json::Value, user_input: &str) -> Plan {
        // Multi-tool shape first.
        if let Some(tools) = value.get("tools").and_then(|v| v.as_array()) {
            let mut steps = Vec::new();
            for entry in tools {
                let Some(name) = entry.get("tool").and_then(|v| v.as_str()) else {
                    continue;
                };
                let Some(kind) = ToolKind::parse(name) else {
                    warn!(tool = name, "Oracle selected an unknown tool, skipping step");
                    continue;
                };
                let params = entry
                    .get("parameters")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                steps.push(PlanStep::new(kind, post_process(kind, params, user_input)));
                if steps.len() == self.max_chain_steps {
                    warn!(max = self.max_chain_steps, "Chain capped at configured maximum");
                    break;
                }
            }
            return match steps.len() {
                0 => Plan::Unresolved,
                1 => Plan::Single(steps.remove(0)),
                _ => Plan::Chain(steps),
            };
        }

        // Single-tool shape.
        match value.get("tool") {
            Some(serde_json::Value::String(name)) => match ToolKind::parse(name) {
                Some(kind) => {
                    let params = value
                        .get("parameters")
                        .and_then(|v| v.as_object())
                        .cloned()
                        .unwrap_or_default();
                    Plan::Single(PlanStep::new(kind, post_process(kind, params, user_input)))
                }
                None => {
                    warn!(tool = %name, "Oracle selected an unknown tool");
                    Plan::Unresolved
                }
            },
            Some(serde_json::Value::Null) => Plan::Unresolved,
            _ => {
                debug!("Oracle JSON had no tool field, falling back to rules");
                self.rules_plan(user_input)
            }
        }
    }

    fn rules_plan(&self, user_input: &str) -> Plan {
        match rules::resolve(user_input) {
            Some((kind, params)) => {
                Plan::Single(PlanStep::new(kind, post_process(kind, params, user_input)))
            }
            None => Plan::Unresolved,
        }
    }

    /// Secondary-signal override: when the input mentions several task
    /// categories and carries an arithmetic expression, a non-calculate
    /// single-step resolution escalates to calculate. Deliberately a
    /// priority escalation, not a merge.
    fn apply_calculate_override(&self, plan: Plan, user_input: &str) -> Plan {
        let Plan::Single(step) = &plan else {
            return plan;
        };
        if step.tool == ToolKind::Calculate {
            return plan;
        }
        if rules::detect_categories(user_input).len() < 2 {
            return plan;
        }
        let Some(expression) = rules::find_arithmetic_expression(user_input) else {
            return plan;
        };

        info!(from = %step.tool, "Arithmetic expression detected alongside other tasks, escalating to calculate");
        let mut params = ParamMap::new();
        params.insert("expression".into(), json!(expression));
        Plan::Single(PlanStep::new(ToolKind::Calculate, params))
    }
}

fn join_params(names: &[String], label: &str) -> String {
    if names.is_empty() {
        format!("none {label}")
    } else {
        names
            .iter()
            .map(|n| format!("{n} ({label})"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fill per-tool parameter defaults. Applied to every resolution path so
/// the executor always sees complete parameters.
fn post_process(kind: ToolKind, mut params: ParamMap, user_input: &str) -> ParamMap {
    match kind {
        ToolKind::Weather => {
            let location = params
                .get("location")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty() && *s != "未知")
                .map(str::to_string)
                .or_else(|| rules::extract_city(user_input).map(str::to_string))
                .unwrap_or_else(|| "北京".to_string());
            params.insert("location".into(), json!(location));
            if !params.contains_key("days") {
                params.insert("days".into(), json!(7));
            }
        }
        ToolKind::News => {
            if !params.contains_key("query") {
                params.insert("query".into(), json!(user_input));
            }
            if !params.contains_key("limit") {
                params.insert("limit".into(), json!(10));
            }
        }
        ToolKind::Stock => {
            let symbol = params
                .get("symbol")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| "000001".to_string());
            // Company names arrive here too; translate before execution.
            let symbol = rules::stock_code_for_name(&symbol)
                .map(str::to_string)
                .unwrap_or(symbol);
            params.insert("symbol".into(), json!(symbol));
            if !params.contains_key("days") {
                params.insert("days".into(), json!(5));
            }
        }
        ToolKind::Calculate => {
            if !params.contains_key("expression") {
                params.insert("expression".into(), json!(user_input));
            }
        }
        ToolKind::Document => {
            if !params.contains_key("template") {
                params.insert("template".into(), json!("summary"));
            }
            if !params.contains_key("content") {
                params.insert("content".into(), json!(user_input));
            }
        }
    }
    params
}
