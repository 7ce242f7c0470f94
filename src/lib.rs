// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Facade crate: re-exports the drover workspace members under one roof.
//!
//! The runtime is split along its seams: configuration, the model client
//! contract, the tool contract, and the conversation core that drives the
//! model ↔ tool loop.  Embedders that want a single dependency use this
//! crate; the members remain usable on their own.

pub use drover_config as config;
pub use drover_core as runtime;
pub use drover_model as model;
pub use drover_tools as tools;

pub use drover_config::{Config, ConversationConfig, RetryConfig};
pub use drover_core::{
    event_stream, events_to_messages, spawn_handler, AgentContext, Callback, CallbackBus,
    Condenser, CondenserOutcome, Conversation, ConversationBuilder, ConversationError,
    ConversationState, Event, EventKind, InvariantError, KnowledgeSkill, NoopCondenser, Source,
    Status, View, DEFAULT_SYSTEM_PROMPT,
};
pub use drover_model::{
    CompletionRequest, ContentPart, LlmClient, LlmMessage, MessageContent, ModelError,
    ModelResponse, Role, ToolCallPayload, ToolSchema,
};
pub use drover_tools::{
    Capability, Field, Observation, RegistryError, Schema, Tool, ToolCall, ToolRegistry,
    ValidationError,
};
