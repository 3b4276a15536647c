//! Chain execution: walk a plan's steps in order, build the ledger.
//!
//! Strictly sequential — later steps may need earlier output as context.
//! A failing step is recorded and execution continues (best effort, no
//! fail-fast), so the outcome always has exactly one envelope per plan
//! step, in declared order.

use crate::invoker::{CancelSignal, ToolInvoker};
use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::plan::{ChainLedgerEntry, Plan, PlanStep};
use lingxi_core::tool::{CapabilityRegistry, ParamMap, ToolKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// One executed step: the tool, the (possibly augmented) parameters it
/// actually ran with, and its envelope.
#[derive(Debug, Clone)]
pub struct ExecutedStep {
    pub tool: ToolKind,
    pub parameters: ParamMap,
    pub envelope: ToolEnvelope,
}

/// The result of running a plan.
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    pub steps: Vec<ExecutedStep>,
    pub ledger: Vec<ChainLedgerEntry>,
}

impl ChainOutcome {
    /// The last step whose envelope succeeded, if any.
    pub fn last_successful(&self) -> Option<&ExecutedStep> {
        self.steps.iter().rev().find(|s| s.envelope.success)
    }
}

pub struct ChainExecutor {
    invoker: ToolInvoker,
}

impl ChainExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            invoker: ToolInvoker::new(registry),
        }
    }

    /// Run a plan to completion. `Single` plans run as one-element chains;
    /// `Unresolved` yields an empty outcome.
    pub async fn run(&self, plan: &Plan) -> ChainOutcome {
        self.run_with_cancel(plan, None).await
    }

    /// Run a plan, optionally cancellable. Cancelled steps are recorded in
    /// the ledger like any other failure, keeping step counts intact.
    pub async fn run_with_cancel(&self, plan: &Plan, cancel: Option<CancelSignal>) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();

        for (index, step) in plan.steps().iter().enumerate() {
            let parameters = augment_parameters(step, outcome.steps.last());
            debug!(step = index, tool = %step.tool, "Executing chain step");

            let envelope = self
                .invoker
                .invoke_kind(step.tool, parameters.clone(), cancel.clone())
                .await;

            if !envelope.success {
                warn!(step = index, tool = %step.tool, error = ?envelope.error,
                      "Chain step failed, continuing with remaining steps");
            }

            outcome.ledger.push(ChainLedgerEntry {
                step_index: index,
                tool: step.tool,
                parameters: parameters.clone(),
                success: envelope.success,
            });
            outcome.steps.push(ExecutedStep {
                tool: step.tool,
                parameters,
                envelope,
            });
        }

        outcome
    }
}

/// Build the parameters a step actually runs with.
///
/// A document step directly preceded by a successful step receives that
/// step's output under `data` and a context note appended to `content`.
/// The original plan step is never mutated.
fn augment_parameters(step: &PlanStep, previous: Option<&ExecutedStep>) -> ParamMap {
    let mut parameters = step.parameters.clone();

    if step.tool != ToolKind::Document {
        return parameters;
    }
    let Some(previous) = previous else {
        return parameters;
    };
    if !previous.envelope.success {
        return parameters;
    }
    let Some(data) = previous.envelope.data.clone() else {
        return parameters;
    };

    parameters.insert("data".into(), data);
    let content = parameters
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let content = if content.is_empty() {
        "Summarize the previous step's result".to_string()
    } else {
        format!("{content} (based on the previous step's result)")
    };
    parameters.insert("content".into(), serde_json::Value::String(content));

    parameters
}
