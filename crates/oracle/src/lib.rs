//! Language oracle access for lingxi.
//!
//! Two ways to turn a request into an intent live here, deliberately side
//! by side: the OpenAI-compatible chat client that asks an external model,
//! and the deterministic rule engine that answers when the model cannot.
//! The resolver in `lingxi-agent` consumes both.

pub mod openai_compat;
pub mod rules;

pub use openai_compat::OpenAiCompatOracle;
