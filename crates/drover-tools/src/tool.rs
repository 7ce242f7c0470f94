// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::schema::Schema;

/// A single validated tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments, already validated against the tool's schema
    pub args: Value,
}

/// The result of executing a tool.
///
/// Tool failures are data, not errors: a failed execution is reported with
/// `is_error = true` so the model can observe the failure and retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl Observation {
    /// Successful result.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Failed result containing a plain-text error message.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: msg.into(),
            is_error: true,
        }
    }

    /// Text projection used when rendering this observation to the model.
    pub fn to_text(&self) -> &str {
        &self.content
    }
}

/// What a tool is allowed to do to the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Read-only inspection of the environment.
    View,
    /// Mutation of the environment (writes, process execution, network side effects).
    Edit,
}

/// Trait that every tool must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Declared argument shape; inputs are validated against it before an
    /// action is materialized.
    fn parameters(&self) -> Schema;
    /// Capabilities this tool exercises.  Default: view only.
    fn capabilities(&self) -> &[Capability] {
        &[Capability::View]
    }
    /// True when invocations of this tool may run concurrently with other
    /// calls of the same batch.  Default false: dispatch stays sequential.
    fn parallel_safe(&self) -> bool {
        false
    }
    /// Execute the tool.  Failures should be wrapped in [`Observation::err`].
    /// Implementations should poll `cancel` and abort as soon as practical.
    async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> Observation;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
