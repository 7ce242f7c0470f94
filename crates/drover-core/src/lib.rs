// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod bus;
mod condenser;
mod conversation;
mod engine;
mod error;
mod event;
mod projection;
mod skills;
mod state;
mod view;

pub use bus::{event_stream, spawn_handler, Callback, CallbackBus};
pub use condenser::{Condenser, CondenserOutcome, NoopCondenser};
pub use conversation::{Conversation, ConversationBuilder, Status, DEFAULT_SYSTEM_PROMPT};
pub use error::ConversationError;
pub use event::{Event, EventKind, Source};
pub use projection::events_to_messages;
pub use skills::{AgentContext, KnowledgeSkill};
pub use state::{ConversationState, InvariantError};
pub use view::View;
