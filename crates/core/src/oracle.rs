//! Oracle trait — the abstraction over the external text-completion service.
//!
//! The oracle is queried with a chat-style request and returns raw text,
//! which is *expected* (not guaranteed) to contain one JSON object. The
//! resolver owns the job of making sense of whatever comes back.

use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a chat-style oracle request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat request to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature — low for intent resolution, higher for
    /// document generation.
    pub temperature: f32,

    /// Ask the backend to constrain output to a single JSON object.
    #[serde(default)]
    pub json_object: bool,
}

impl OracleRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
            json_object: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_object = true;
        self
    }
}

/// The oracle contract.
///
/// Implementations block on network I/O and must enforce their own timeout;
/// callers treat any `Err` as "fall back to the rule engine".
#[async_trait]
pub trait Oracle: Send + Sync {
    /// A human-readable name for this oracle backend.
    fn name(&self) -> &str;

    /// Send a chat request and return the raw response text.
    async fn chat(&self, request: OracleRequest) -> Result<String, OracleError>;
}
