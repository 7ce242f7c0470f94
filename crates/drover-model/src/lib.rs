// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod client;
mod error;
pub mod mock;
mod types;

pub use client::LlmClient;
pub use error::ModelError;
pub use mock::{HangingMockClient, MockClient, ScriptedMockClient};
pub use types::{
    CompletionRequest, ContentPart, LlmMessage, MessageContent, ModelResponse, Role,
    ToolCallPayload, ToolSchema,
};
