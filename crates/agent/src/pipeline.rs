//! The request orchestrator: resolve → execute → aggregate.
//!
//! Each request is one independent orchestration unit. The stages have
//! non-throwing contracts, so `execute` always returns a structured
//! response — unresolvable input, failed providers, and cancellations all
//! surface through the payload, never as an error.

use crate::aggregate::aggregate;
use crate::executor::{ChainExecutor, ChainOutcome};
use crate::invoker::CancelSignal;
use crate::resolver::IntentResolver;
use chrono::Utc;
use lingxi_core::display::DisplayResult;
use lingxi_core::oracle::Oracle;
use lingxi_core::plan::Plan;
use lingxi_core::tool::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// One step of the workflow trace shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub timestamp: String,
}

/// One tool invocation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolLog {
    pub id: String,
    pub tool_name: String,
    pub input_params: String,
    pub output_result: String,
    pub status: String,
    pub duration: String,
    pub timestamp: String,
}

/// The full response for one orchestrated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub task_id: String,
    pub status: String,
    pub steps: Vec<WorkflowStep>,
    pub logs: Vec<ToolLog>,
    pub result: DisplayResult,
}

pub struct Orchestrator {
    resolver: IntentResolver,
    executor: ChainExecutor,
}

impl Orchestrator {
    pub fn new(oracle: Arc<dyn Oracle>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            resolver: IntentResolver::new(oracle, registry.clone()),
            executor: ChainExecutor::new(registry),
        }
    }

    /// Cap oracle-produced chains at a maximum step count.
    pub fn with_max_chain_steps(mut self, max: usize) -> Self {
        self.resolver = self.resolver.with_max_chain_steps(max);
        self
    }

    /// Execute one request end to end.
    pub async fn execute(&self, user_input: &str, conversation_id: Option<&str>) -> WorkflowResponse {
        self.execute_with_cancel(user_input, conversation_id, None)
            .await
    }

    /// Execute one request, cooperatively cancellable. A cancelled request
    /// still returns a structured response whose envelopes record the
    /// cancellation.
    pub async fn execute_with_cancel(
        &self,
        user_input: &str,
        conversation_id: Option<&str>,
        cancel: Option<CancelSignal>,
    ) -> WorkflowResponse {
        let task_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().format("%H:%M:%S").to_string();
        info!(task_id = %task_id, conversation_id = ?conversation_id, "Workflow received");

        debug!(task_id = %task_id, "Workflow stage: resolving");
        let resolve_started = Instant::now();
        let plan = self.resolver.resolve(user_input).await;
        let resolve_ms = resolve_started.elapsed().as_millis() as u64;
        debug!(task_id = %task_id, steps = plan.len(), unresolved = plan.is_unresolved(),
               "Workflow stage: resolved");

        debug!(task_id = %task_id, "Workflow stage: executing");
        let outcome = self.executor.run_with_cancel(&plan, cancel).await;

        debug!(task_id = %task_id, "Workflow stage: aggregating");
        let result = aggregate(user_input, &outcome);

        let steps = build_steps(&plan, &outcome, &timestamp);
        let logs = build_logs(&plan, &outcome, resolve_ms, &timestamp);
        info!(task_id = %task_id, "Workflow completed");

        WorkflowResponse {
            task_id,
            status: "success".into(),
            steps,
            logs,
            result,
        }
    }
}

fn build_steps(plan: &Plan, outcome: &ChainOutcome, timestamp: &str) -> Vec<WorkflowStep> {
    let step = |id: usize, name: &str, description: String, ok: bool| WorkflowStep {
        id: id.to_string(),
        name: name.to_string(),
        description,
        status: if ok { "success" } else { "failed" }.to_string(),
        timestamp: timestamp.to_string(),
    };

    if plan.is_chain() {
        let mut steps = vec![step(
            1,
            "Intent recognition",
            "Analyse the request (multiple tools identified)".into(),
            true,
        )];
        for (i, executed) in outcome.steps.iter().enumerate() {
            steps.push(step(
                i + 2,
                &format!("Execute tool {}", i + 1),
                format!("Invoke the {} tool", executed.tool),
                executed.envelope.success,
            ));
        }
        steps.push(step(
            outcome.steps.len() + 2,
            "Result merge",
            "Merge the outputs of all tools".into(),
            true,
        ));
        steps
    } else {
        let invoked_ok = outcome
            .steps
            .first()
            .map(|s| s.envelope.success)
            .unwrap_or(true);
        vec![
            step(
                1,
                "Intent recognition",
                "Analyse the natural-language request".into(),
                true,
            ),
            step(2, "Tool routing", "Select the capability chain".into(), true),
            step(
                3,
                "Invocation",
                "Call the external provider".into(),
                invoked_ok,
            ),
            step(
                4,
                "Result generation",
                "Merge data into a display payload".into(),
                true,
            ),
        ]
    }
}

fn build_logs(
    plan: &Plan,
    outcome: &ChainOutcome,
    resolve_ms: u64,
    timestamp: &str,
) -> Vec<ToolLog> {
    let intent = plan
        .steps()
        .first()
        .map(|s| s.tool.as_str())
        .unwrap_or("none");

    let mut logs = vec![ToolLog {
        id: "log-1".into(),
        tool_name: "Orchestrator".into(),
        input_params: serde_json::json!({
            "intent": intent,
            "is_multi_tool": plan.is_chain(),
        })
        .to_string(),
        output_result: r#"{"status": 200}"#.into(),
        status: "success".into(),
        duration: format!("{resolve_ms}ms"),
        timestamp: timestamp.to_string(),
    }];

    for (i, executed) in outcome.steps.iter().enumerate() {
        let ok = executed.envelope.success;
        logs.push(ToolLog {
            id: format!("log-{}", i + 2),
            tool_name: executed.tool.as_str().to_uppercase(),
            input_params: serde_json::Value::Object(executed.parameters.clone()).to_string(),
            output_result: serde_json::json!({"status": if ok { 200 } else { 500 }}).to_string(),
            status: if ok { "success" } else { "failed" }.to_string(),
            duration: format!("{}ms", executed.envelope.metadata.duration_ms),
            timestamp: timestamp.to_string(),
        });
    }

    logs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lingxi_core::display::ChartType;
    use lingxi_core::error::OracleError;
    use lingxi_core::oracle::OracleRequest;

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

    fn orchestrator(oracle: Arc<dyn Oracle>) -> Orchestrator {
        let registry = lingxi_tools::default_registry(
            &lingxi_config::AppConfig::default(),
            oracle.clone(),
        );
        Orchestrator::new(oracle, Arc::new(registry))
    }

    #[tokio::test]
    async fn single_tool_request_end_to_end() {
        let orchestrator = orchestrator(Arc::new(DisabledOracle));
        let response = orchestrator.execute("查北京天气", None).await;

        assert_eq!(response.status, "success");
        assert!(!response.task_id.is_empty());
        // Fixed four-step trace for single-tool runs.
        assert_eq!(response.steps.len(), 4);
        assert!(response.steps.iter().all(|s| s.status == "success"));
        // Orchestrator log plus one tool log.
        assert_eq!(response.logs.len(), 2);
        assert_eq!(response.logs[1].tool_name, "WEATHER");
        assert!(response.logs[1].input_params.contains("北京"));
        assert_eq!(response.result.chart_type, ChartType::Line);
    }

    #[tokio::test]
    async fn chain_request_builds_per_tool_steps() {
        let orchestrator = orchestrator(Arc::new(ScriptedOracle(
            r#"{"tools": [
                {"tool": "weather", "parameters": {"location": "北京", "days": 3}},
                {"tool": "document", "parameters": {"template": "summary", "content": "天气总结"}}
            ]}"#
            .into(),
        )));
        let response = orchestrator.execute("查北京天气并写总结", None).await;

        // Intent + 2 tool steps + merge.
        assert_eq!(response.steps.len(), 4);
        assert_eq!(response.steps[1].name, "Execute tool 1");
        assert_eq!(response.steps[2].name, "Execute tool 2");
        assert_eq!(response.logs.len(), 3);
        assert_eq!(response.logs[2].tool_name, "DOCUMENT");
        // Document content folded into the merged summary.
        assert!(response.result.summary.contains("## Guide"));
    }

    #[tokio::test]
    async fn unresolvable_request_is_still_structured() {
        let orchestrator = orchestrator(Arc::new(DisabledOracle));
        let response = orchestrator.execute("你好", None).await;

        assert_eq!(response.status, "success");
        assert_eq!(response.steps.len(), 4);
        assert_eq!(response.logs.len(), 1);
        assert!(response.logs[0].input_params.contains("none"));
        assert_eq!(response.result.chart_type, ChartType::None);
        assert!(response.result.summary.contains("你好"));
    }

    #[tokio::test]
    async fn empty_oracle_parameters_are_filled_before_execution() {
        let orchestrator = orchestrator(Arc::new(ScriptedOracle(
            r#"{"tools": [
                {"tool": "weather", "parameters": {"location": "北京", "days": 2}},
                {"tool": "stock", "parameters": {"symbol": "", "days": 5}}
            ]}"#
            .into(),
        )));
        let response = orchestrator.execute("查天气和股票", None).await;
        // Post-processing fills the empty symbol, so both steps succeed and
        // the merge path renders the two-entry breakdown.
        assert_eq!(response.steps.len(), 4);
        let raw = response.result.raw_data.as_array().unwrap();
        assert_eq!(raw.len(), 2);
        assert!(response.logs[2].input_params.contains("000001"));
    }

    #[tokio::test]
    async fn cancelled_request_returns_structured_response() {
        let orchestrator = orchestrator(Arc::new(DisabledOracle));
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).expect("receiver alive");

        let response = orchestrator
            .execute_with_cancel("查北京天气", None, Some(rx))
            .await;
        assert_eq!(response.status, "success");
        assert!(response.result.summary.starts_with("execution failed:"));
        assert!(response.result.summary.contains("cancelled"));
    }

    #[tokio::test]
    async fn response_serializes_in_camel_case() {
        let orchestrator = orchestrator(Arc::new(DisabledOracle));
        let response = orchestrator.execute("计算 1+1", None).await;
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"taskId\""));
        assert!(json.contains("\"toolName\""));
        assert!(json.contains("\"inputParams\""));
        assert!(json.contains("\"chartType\""));
    }
}
