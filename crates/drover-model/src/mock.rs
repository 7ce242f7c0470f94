// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    CompletionRequest, LlmClient, ModelError, ModelResponse, Role, ToolCallPayload,
};

/// Deterministic mock client for tests.  Echoes the last user message back as
/// the final assistant response.
#[derive(Default)]
pub struct MockClient;

#[async_trait]
impl LlmClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        req: CompletionRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();
        Ok(ModelResponse::text(format!("MOCK: {reply}")))
    }
}

/// A pre-scripted mock client.  Each call to `complete` pops the next result
/// from the front of the queue.  This lets tests specify exact response
/// sequences – including tool calls and transport failures – without network
/// access.
pub struct ScriptedMockClient {
    scripts: Arc<Mutex<Vec<Result<ModelResponse, ModelError>>>>,
    /// Every `CompletionRequest` seen by this client, in call order.
    /// Written on each `complete()` call so tests can inspect what was sent.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedMockClient {
    /// Build a client from an ordered list of responses, one per call.
    pub fn new(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok))
    }

    /// Build a client whose calls may also fail with scripted transport errors.
    pub fn with_results(
        results: impl IntoIterator<Item = Result<ModelResponse, ModelError>>,
    ) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(results.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: client that returns a single final text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![ModelResponse::text(reply)])
    }

    /// Convenience: client that returns one tool call, then a final text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            ModelResponse::tool_calls(
                "",
                [ToolCallPayload {
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                }],
            ),
            ModelResponse::text(final_text),
        ])
    }

    /// The last request seen, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// How many completion calls were made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedMockClient {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    async fn complete(
        &self,
        req: CompletionRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(req);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            // Default fallback when all scripts are consumed
            debug!("scripted mock exhausted; serving fallback text");
            Ok(ModelResponse::text("[no more scripts]"))
        } else {
            scripts.remove(0)
        }
    }
}

/// Mock client that never responds: `complete` parks until the cancel token
/// fires, then returns [`ModelError::Cancelled`].  Used to exercise
/// cancellation of an in-flight model call.
#[derive(Default)]
pub struct HangingMockClient;

#[async_trait]
impl LlmClient for HangingMockClient {
    fn name(&self) -> &str {
        "hanging-mock"
    }

    async fn complete(
        &self,
        _req: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        cancel.cancelled().await;
        Err(ModelError::Cancelled)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
