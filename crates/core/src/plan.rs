//! Plans and the chain execution ledger.

use crate::tool::{ParamMap, ToolKind};
use serde::{Deserialize, Serialize};

/// One step of a plan: a tool and the parameters to call it with.
///
/// Immutable once constructed. The chain executor works on an *augmented
/// copy* of a step's parameters when it injects prior-step context; the
/// plan itself is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool: ToolKind,
    pub parameters: ParamMap,
}

impl PlanStep {
    pub fn new(tool: ToolKind, parameters: ParamMap) -> Self {
        Self { tool, parameters }
    }
}

/// The resolved intent for one request.
///
/// Produced once by the intent resolver, consumed once by the chain
/// executor, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Plan {
    /// One tool call.
    Single(PlanStep),
    /// An ordered chain of tool calls, executed strictly sequentially.
    Chain(Vec<PlanStep>),
    /// The input matched no capability.
    Unresolved,
}

impl Plan {
    /// The plan's steps in declared order. `Unresolved` has none.
    pub fn steps(&self) -> &[PlanStep] {
        match self {
            Plan::Single(step) => std::slice::from_ref(step),
            Plan::Chain(steps) => steps,
            Plan::Unresolved => &[],
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps().len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps().is_empty()
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Plan::Unresolved)
    }

    /// Whether this plan chains more than one tool.
    pub fn is_chain(&self) -> bool {
        matches!(self, Plan::Chain(steps) if steps.len() > 1)
    }
}

/// One entry of the execution ledger, appended per executed step.
///
/// Order equals execution order equals declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainLedgerEntry {
    pub step_index: usize,
    pub tool: ToolKind,
    pub parameters: ParamMap,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(tool: ToolKind) -> PlanStep {
        PlanStep::new(tool, ParamMap::new())
    }

    #[test]
    fn single_plan_is_one_step() {
        let plan = Plan::Single(step(ToolKind::Weather));
        assert_eq!(plan.len(), 1);
        assert!(!plan.is_chain());
        assert!(!plan.is_unresolved());
    }

    #[test]
    fn chain_plan_keeps_declared_order() {
        let plan = Plan::Chain(vec![step(ToolKind::Weather), step(ToolKind::Document)]);
        let tools: Vec<ToolKind> = plan.steps().iter().map(|s| s.tool).collect();
        assert_eq!(tools, vec![ToolKind::Weather, ToolKind::Document]);
        assert!(plan.is_chain());
    }

    #[test]
    fn unresolved_plan_has_no_steps() {
        let plan = Plan::Unresolved;
        assert!(plan.is_empty());
        assert!(plan.is_unresolved());
    }
}
