// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use drover_config::Config;
use drover_model::{
    CompletionRequest, LlmClient, LlmMessage, ModelError, ModelResponse, ToolCallPayload,
};
use drover_tools::{Observation, Tool, ToolCall, ToolRegistry};

use crate::condenser::{Condenser, CondenserOutcome};
use crate::conversation::Shared;
use crate::event::Event;
use crate::projection::events_to_messages;
use crate::state::InvariantError;

/// Why a step did not complete normally.
#[derive(Debug)]
pub(crate) enum StepError {
    /// The cancel token fired; the controller records the cancellation marker.
    Cancelled,
    /// Transport failed permanently.  An agent-error event has already been
    /// appended; the controller transitions to the errored state.
    Fatal(String),
    Invariant(InvariantError),
}

/// Render registry schemas in the form sent to the model.
pub(crate) fn model_tool_schemas(registry: &ToolRegistry) -> Vec<drover_model::ToolSchema> {
    registry
        .schemas()
        .into_iter()
        .map(|s| drover_model::ToolSchema {
            name: s.name,
            description: s.description,
            parameters: s.parameters,
        })
        .collect()
}

/// Executes one model round-trip: condense → project → call → materialize
/// events → dispatch tools → record observations.
///
/// The engine never holds the state lock across the model call or tool
/// execution; only the short append/project critical sections take it.
pub(crate) struct StepEngine {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    condenser: Arc<dyn Condenser>,
    config: Arc<Config>,
}

impl StepEngine {
    pub(crate) fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        condenser: Arc<dyn Condenser>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            llm,
            tools,
            condenser,
            config,
        }
    }

    pub(crate) async fn step(
        &self,
        shared: &Shared,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        // Condense and project under the lock.
        let messages = {
            let mut state = shared.state.lock().await;
            state.steps_taken += 1;
            let view = match self.condenser.condense(state.view()) {
                CondenserOutcome::View(view) => view,
                CondenserOutcome::Condensation {
                    forgotten_event_ids,
                    summary,
                    summary_offset,
                } => {
                    state
                        .append(Event::condensation(forgotten_event_ids, summary, summary_offset))
                        .map_err(StepError::Invariant)?;
                    state.view()
                }
            };
            events_to_messages(view.events())
        };
        shared.flush_events().await;

        // The long I/O happens with the lock released so pause, cancel and
        // send_message stay responsive.
        let response = self.complete_with_retry(shared, messages, cancel).await?;

        match response {
            ModelResponse::AssistantText { thought, tool_calls } if tool_calls.is_empty() => {
                debug!("model returned a final message");
                {
                    let mut state = shared.state.lock().await;
                    state
                        .append(Event::agent_message(thought))
                        .map_err(StepError::Invariant)?;
                    state.finished = true;
                }
                shared.flush_events().await;
                Ok(())
            }
            ModelResponse::AssistantText { thought, tool_calls } => {
                self.run_batch(shared, thought, tool_calls, cancel).await
            }
            ModelResponse::Refusal { reason } => {
                // Not a terminal condition: the user can still intervene.
                {
                    let mut state = shared.state.lock().await;
                    state
                        .append(Event::agent_error(
                            format!("the model declined to continue: {reason}"),
                            None,
                        ))
                        .map_err(StepError::Invariant)?;
                }
                shared.flush_events().await;
                Ok(())
            }
        }
    }

    /// Call the model, retrying retryable transport failures with exponential
    /// backoff.  Each retry re-enters the critical section and re-projects so
    /// events appended while backing off (e.g. queued user messages) reach
    /// the retried request.
    async fn complete_with_retry(
        &self,
        shared: &Shared,
        mut messages: Vec<LlmMessage>,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, StepError> {
        let retry = &self.config.retry;
        let tools = model_tool_schemas(&self.tools);
        let mut attempt: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(StepError::Cancelled);
            }
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: tools.clone(),
            };
            match self.llm.complete(request, cancel).await {
                Ok(response) => return Ok(response),
                Err(ModelError::Cancelled) => return Err(StepError::Cancelled),
                Err(error) if error.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_ms(attempt);
                    warn!(attempt, delay_ms = delay, %error, "retryable model failure; backing off");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(StepError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    }
                    attempt += 1;
                    let state = shared.state.lock().await;
                    messages = events_to_messages(state.view().events());
                }
                Err(error) => {
                    {
                        let mut state = shared.state.lock().await;
                        state
                            .append(Event::agent_error(
                                format!("model call failed: {error}"),
                                None,
                            ))
                            .map_err(StepError::Invariant)?;
                    }
                    shared.flush_events().await;
                    return Err(StepError::Fatal(error.to_string()));
                }
            }
        }
    }

    /// Materialize one model response's tool calls and run them.
    async fn run_batch(
        &self,
        shared: &Shared,
        thought: String,
        calls: Vec<ToolCallPayload>,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let batch_id = Uuid::new_v4().to_string();

        // Validate every call up front so the batch's actions land in the log
        // contiguously; agent errors for failed calls follow the batch.
        let mut validated: Vec<ToolCall> = Vec::new();
        let mut action_events: Vec<Event> = Vec::new();
        let mut error_events: Vec<Event> = Vec::new();
        let mut parallel = self.config.conversation.parallel_tool_calls;
        for call in &calls {
            match self.validate_call(call) {
                Ok((args, tool)) => {
                    let thought_for = if action_events.is_empty() {
                        thought.clone()
                    } else {
                        String::new()
                    };
                    action_events.push(Event::action(
                        thought_for,
                        &call.name,
                        args.clone(),
                        &call.id,
                        &batch_id,
                    ));
                    parallel &= tool.parallel_safe();
                    validated.push(ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args,
                    });
                }
                Err(message) => {
                    error_events.push(Event::agent_error(message, Some(call.id.clone())));
                }
            }
        }

        let action_ids: Vec<String> = action_events.iter().map(|e| e.id.clone()).collect();
        {
            let mut state = shared.state.lock().await;
            for event in action_events {
                state.append(event).map_err(StepError::Invariant)?;
            }
            for event in error_events {
                state.append(event).map_err(StepError::Invariant)?;
            }
        }
        shared.flush_events().await;

        if validated.is_empty() {
            return Ok(());
        }

        // Execute outside the lock.  `late` marks results synthesized after
        // cancellation cut execution short.
        let results: Vec<(Observation, bool)> = if parallel && validated.len() > 1 {
            self.dispatch_parallel(&validated, cancel).await
        } else {
            self.dispatch_sequential(&validated, cancel).await
        };

        {
            let mut state = shared.state.lock().await;
            for ((call, (observation, late)), action_id) in
                validated.iter().zip(results).zip(&action_ids)
            {
                if late && self.config.conversation.drop_late_observations {
                    debug!(tool = %call.name, "dropping late observation for cancelled action");
                    continue;
                }
                state
                    .append(Event::observation(
                        action_id,
                        &call.id,
                        &call.name,
                        observation.to_text(),
                        observation.is_error || late,
                    ))
                    .map_err(StepError::Invariant)?;
            }
        }
        shared.flush_events().await;

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        Ok(())
    }

    /// Resolve one raw tool call into validated arguments, or an error
    /// message the model will see as user input.
    fn validate_call(
        &self,
        call: &ToolCallPayload,
    ) -> Result<(serde_json::Value, Arc<dyn Tool>), String> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Err(format!("no such tool: {}", call.name));
        };
        let args: serde_json::Value = serde_json::from_str(&call.arguments).map_err(|e| {
            format!("arguments for tool `{}` are not valid JSON: {e}", call.name)
        })?;
        tool.parameters().validate(&args).map_err(|e| {
            format!("arguments for tool `{}` failed schema validation: {e}", call.name)
        })?;
        Ok((args, tool))
    }

    /// Run calls one at a time in declared order.  Each runs in its own task
    /// so a panicking tool is isolated from the engine.
    async fn dispatch_sequential(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<(Observation, bool)> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                results.push((Observation::err(&call.id, "interrupted by cancellation"), true));
                continue;
            }
            let registry = Arc::clone(&self.tools);
            let owned = call.clone();
            let token = cancel.clone();
            let task = tokio::spawn(async move { registry.execute(&owned, &token).await });
            let result = tokio::select! {
                biased;
                // Abandoning the join handle detaches the task; the tool keeps
                // running but its result no longer reaches the log.
                _ = cancel.cancelled() => {
                    (Observation::err(&call.id, "interrupted by cancellation"), true)
                }
                joined = task => match joined {
                    Ok(observation) => (observation, false),
                    Err(e) => (Observation::err(&call.id, format!("tool panicked: {e}")), false),
                },
            };
            results.push(result);
        }
        results
    }

    /// Run every call of the batch concurrently, collecting results in the
    /// batch's declared order.
    async fn dispatch_parallel(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<(Observation, bool)> {
        let tasks: Vec<_> = calls
            .iter()
            .map(|call| {
                let registry = Arc::clone(&self.tools);
                let owned = call.clone();
                let token = cancel.clone();
                tokio::spawn(async move { registry.execute(&owned, &token).await })
            })
            .collect();

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = join_all(tasks) => Some(joined),
        };

        match joined {
            Some(joined) => joined
                .into_iter()
                .zip(calls)
                .map(|(result, call)| match result {
                    Ok(observation) => (observation, false),
                    Err(e) => (
                        Observation::err(&call.id, format!("tool panicked: {e}")),
                        false,
                    ),
                })
                .collect(),
            None => calls
                .iter()
                .map(|call| (Observation::err(&call.id, "interrupted by cancellation"), true))
                .collect(),
        }
    }
}
