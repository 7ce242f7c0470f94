// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use crate::event::{Event, EventKind};
use crate::view::View;

/// A state-invariant violation.  Fatal: the conversation transitions to the
/// errored state and no recovery is attempted.
#[derive(Debug, Clone, Error)]
#[error("conversation invariant violated: {0}")]
pub struct InvariantError(pub String);

/// The single source of truth for one conversation: the append-only event log
/// plus the derived flags the controller consults between steps.
///
/// All mutation goes through [`ConversationState::append`], which enforces the
/// log invariants: unique ids, observations answering an earlier action with
/// a matching tool call id, and contiguous batches.  Mutations happen only
/// under the controller's lock; past events are never edited.
#[derive(Debug)]
pub struct ConversationState {
    pub id: String,
    events: Vec<Event>,
    /// Index from event id to log position.
    index: HashMap<String, usize>,
    /// Batches already closed by a non-action event.
    sealed_batches: HashSet<String>,
    pub finished: bool,
    pub initial_context_sent: bool,
    /// Knowledge skills already activated; never re-activated.
    pub activated_skills: Vec<String>,
    /// Steps executed over the lifetime of the conversation.
    pub steps_taken: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            events: Vec::new(),
            index: HashMap::new(),
            sealed_batches: HashSet::new(),
            finished: false,
            initial_context_sent: false,
            activated_skills: Vec::new(),
            steps_taken: 0,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Event> {
        self.index.get(id).map(|&i| &self.events[i])
    }

    /// Recompute the condensed view of the log.
    pub fn view(&self) -> View {
        View::from_events(&self.events)
    }

    /// Append one event, enforcing the log invariants.
    pub fn append(&mut self, event: Event) -> Result<(), InvariantError> {
        if self.index.contains_key(&event.id) {
            return Err(InvariantError(format!("duplicate event id {}", event.id)));
        }

        match &event.kind {
            EventKind::Observation {
                action_id,
                tool_call_id,
                ..
            } => {
                let action = self.find(action_id).ok_or_else(|| {
                    InvariantError(format!(
                        "observation references unknown action {action_id}"
                    ))
                })?;
                match &action.kind {
                    EventKind::Action {
                        tool_call_id: action_tc,
                        ..
                    } if action_tc == tool_call_id => {}
                    EventKind::Action { .. } => {
                        return Err(InvariantError(format!(
                            "observation tool_call_id {tool_call_id} does not match action {action_id}"
                        )));
                    }
                    _ => {
                        return Err(InvariantError(format!(
                            "observation references non-action event {action_id}"
                        )));
                    }
                }
            }
            EventKind::Action { batch_id, .. } => {
                if self.sealed_batches.contains(batch_id) {
                    return Err(InvariantError(format!(
                        "batch {batch_id} is no longer contiguous"
                    )));
                }
            }
            _ => {}
        }

        // Any non-action event after a batch seals it: a later action with
        // the same batch id would no longer be contiguous.
        if event.batch_id().is_none() {
            if let Some(prev) = self.events.last() {
                if let Some(open) = prev.batch_id() {
                    self.sealed_batches.insert(open.to_string());
                }
            }
        } else if let Some(prev) = self.events.last() {
            if let Some(open) = prev.batch_id() {
                if Some(open) != event.batch_id() {
                    self.sealed_batches.insert(open.to_string());
                }
            }
        }

        self.index.insert(event.id.clone(), self.events.len());
        self.events.push(event);
        Ok(())
    }

    pub fn skill_activated(&self, name: &str) -> bool {
        self.activated_skills.iter().any(|s| s == name)
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
