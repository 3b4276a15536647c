//! The orchestration pipeline for lingxi.
//!
//! One request flows through this crate end to end: the resolver turns
//! free text into a [`lingxi_core::Plan`] (asking the oracle, falling back
//! to rules), the executor walks the plan step by step through the
//! invoker, and the aggregator merges the resulting envelopes into a
//! single display payload. [`Orchestrator`] ties the stages together and
//! guarantees a structured response for every input.

pub mod aggregate;
pub mod executor;
pub mod extract;
pub mod invoker;
pub mod pipeline;
pub mod resolver;

pub use aggregate::aggregate;
pub use executor::{ChainExecutor, ChainOutcome, ExecutedStep};
pub use invoker::{CancelSignal, ToolInvoker};
pub use pipeline::{Orchestrator, ToolLog, WorkflowResponse, WorkflowStep};
pub use resolver::IntentResolver;
