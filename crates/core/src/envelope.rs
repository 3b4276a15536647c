//! The uniform result envelope every capability call returns.
//!
//! `data` and `error` are mutually exclusive; the constructors are the only
//! way envelopes are built, so the invariant holds everywhere.

use crate::tool::ToolKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Execution metadata attached to every envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Name of the tool that produced this envelope.
    pub tool: String,

    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: u64,

    /// When the invocation finished.
    pub timestamp: DateTime<Utc>,

    /// Whether the data came from the deterministic mock generator rather
    /// than a live provider.
    #[serde(default)]
    pub is_mock: bool,

    /// Which provider produced the data (e.g. "seniverse", "newsapi").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// The result of one capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope {
    /// Whether the invocation succeeded.
    pub success: bool,

    /// Structured output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution metadata.
    pub metadata: EnvelopeMetadata,
}

impl ToolEnvelope {
    /// A successful envelope from a live provider.
    pub fn ok(tool: ToolKind, data: serde_json::Value, started: Instant) -> Self {
        Self::ok_with(tool, data, started, false, None)
    }

    /// A successful envelope with explicit provenance.
    pub fn ok_with(
        tool: ToolKind,
        data: serde_json::Value,
        started: Instant,
        is_mock: bool,
        provider: Option<&str>,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: EnvelopeMetadata {
                tool: tool.as_str().to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
                is_mock,
                provider: provider.map(str::to_string),
            },
        }
    }

    /// A failure envelope. `tool` is a raw name so that unknown-capability
    /// failures can carry the name the caller asked for.
    pub fn failure(tool: &str, error: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: EnvelopeMetadata {
                tool: tool.to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
                is_mock: false,
                provider: None,
            },
        }
    }

    /// The distinct envelope returned when an in-flight invocation was
    /// cancelled by its owning request. Not conflated with failure text so
    /// callers can tell "you asked us to stop" from "we tried and failed".
    pub fn cancelled(tool: &str, started: Instant) -> Self {
        Self::failure(tool, CANCELLED_ERROR, started)
    }

    /// Whether this envelope records a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        self.error.as_deref() == Some(CANCELLED_ERROR)
    }

    /// The envelope's data as an object, if it is one.
    pub fn data_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.data.as_ref().and_then(|v| v.as_object())
    }
}

/// Error text used by the cancellation envelope.
pub const CANCELLED_ERROR: &str = "invocation cancelled";
