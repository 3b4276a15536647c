//! Core domain types and traits for lingxi.
//!
//! This crate defines the vocabulary the whole workspace speaks:
//! tool identity, the uniform result envelope, plans and their execution
//! ledger, the display payload sent to the frontend, and the traits that
//! capabilities and the language oracle implement.

pub mod display;
pub mod envelope;
pub mod error;
pub mod oracle;
pub mod plan;
pub mod tool;

pub use display::{ChartType, DisplayResult};
pub use envelope::{EnvelopeMetadata, ToolEnvelope};
pub use error::OracleError;
pub use oracle::{ChatMessage, ChatRole, Oracle, OracleRequest};
pub use plan::{ChainLedgerEntry, Plan, PlanStep};
pub use tool::{Capability, CapabilityDescriptor, CapabilityRegistry, ParamMap, ToolKind};
