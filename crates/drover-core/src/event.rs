// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drover_model::{ContentPart, ToolSchema};

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    User,
    Agent,
    Environment,
}

/// One immutable record in the conversation log.
///
/// The header (id, timestamp, source) is shared by all kinds; the payload is
/// the serde-flattened [`EventKind`], discriminated by its `kind` tag.  Ids
/// are UUIDv7 so insertion order and id order agree; events reference each
/// other by id only, never by pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// The system prompt plus the frozen tool declarations for this
    /// conversation.  Appended once, before the first user message.
    SystemPrompt {
        text: String,
        tools: Vec<ToolSchema>,
    },
    /// A plain conversational turn from the user, the agent, or the
    /// environment.
    Message {
        content: Vec<ContentPart>,
        /// Names of the knowledge skills that augmented this message.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        activated_skills: Vec<String>,
    },
    /// The agent decided to invoke one tool.
    Action {
        /// Free-text reasoning the model attached to the batch.  Only the
        /// first action of a batch carries it; the rest leave it empty.
        thought: String,
        tool_name: String,
        /// Validated JSON arguments.
        arguments: serde_json::Value,
        /// The tool call id echoed from the model response.
        tool_call_id: String,
        /// Groups actions that came from the same model response.
        batch_id: String,
    },
    /// The result of one action.
    Observation {
        /// Id of the [`EventKind::Action`] event this observation answers.
        action_id: String,
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    /// A recoverable error surfaced to the model as user input.
    AgentError {
        error: String,
        /// Set when the error answers a specific tool call (validation
        /// failure, unknown tool), so it pairs with that call.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },
    /// A rewrite marker: alters how the log projects to a view without
    /// deleting anything from the log.
    Condensation {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        forgotten_event_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        /// View index at which the summary message is spliced in.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary_offset: Option<usize>,
    },
}

impl Event {
    pub fn new(source: Source, kind: EventKind) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            source,
            kind,
        }
    }

    pub fn system_prompt(text: impl Into<String>, tools: Vec<ToolSchema>) -> Self {
        Self::new(
            Source::Agent,
            EventKind::SystemPrompt {
                text: text.into(),
                tools,
            },
        )
    }

    pub fn user_message(content: Vec<ContentPart>, activated_skills: Vec<String>) -> Self {
        Self::new(
            Source::User,
            EventKind::Message {
                content,
                activated_skills,
            },
        )
    }

    pub fn agent_message(text: impl Into<String>) -> Self {
        Self::new(
            Source::Agent,
            EventKind::Message {
                content: vec![ContentPart::text(text)],
                activated_skills: Vec::new(),
            },
        )
    }

    pub fn environment_message(text: impl Into<String>) -> Self {
        Self::new(
            Source::Environment,
            EventKind::Message {
                content: vec![ContentPart::text(text)],
                activated_skills: Vec::new(),
            },
        )
    }

    pub fn action(
        thought: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
        tool_call_id: impl Into<String>,
        batch_id: impl Into<String>,
    ) -> Self {
        Self::new(
            Source::Agent,
            EventKind::Action {
                thought: thought.into(),
                tool_name: tool_name.into(),
                arguments,
                tool_call_id: tool_call_id.into(),
                batch_id: batch_id.into(),
            },
        )
    }

    pub fn observation(
        action_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(
            Source::Environment,
            EventKind::Observation {
                action_id: action_id.into(),
                tool_call_id: tool_call_id.into(),
                tool_name: tool_name.into(),
                content: content.into(),
                is_error,
            },
        )
    }

    pub fn agent_error(error: impl Into<String>, tool_call_id: Option<String>) -> Self {
        Self::new(
            Source::Agent,
            EventKind::AgentError {
                error: error.into(),
                tool_call_id,
            },
        )
    }

    pub fn condensation(
        forgotten_event_ids: Vec<String>,
        summary: Option<String>,
        summary_offset: Option<usize>,
    ) -> Self {
        Self::new(
            Source::Environment,
            EventKind::Condensation {
                forgotten_event_ids,
                summary,
                summary_offset,
            },
        )
    }

    /// The batch this event belongs to, when it is an action.
    pub fn batch_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Action { batch_id, .. } => Some(batch_id),
            _ => None,
        }
    }

    pub fn is_condensation(&self) -> bool {
        matches!(self.kind, EventKind::Condensation { .. })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
