// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use drover_model::{LlmMessage, MessageContent, Role, ToolCallPayload};

use crate::event::{Event, EventKind, Source};

/// Project an event sequence into the chat-format input for the model.
///
/// This is a pure function of its input.  The one subtle rule: a contiguous
/// run of actions sharing a `batch_id` becomes ONE assistant message whose
/// `tool_calls` lists every action in batch order.  Splitting a batch into
/// separate assistant messages corrupts the chat format and some providers
/// reject the follow-up request.
pub fn events_to_messages(events: &[Event]) -> Vec<LlmMessage> {
    let mut messages = Vec::new();
    let mut i = 0;
    while i < events.len() {
        if let Some(batch_id) = events[i].batch_id() {
            let mut j = i + 1;
            while j < events.len() && events[j].batch_id() == Some(batch_id) {
                j += 1;
            }
            messages.push(combine_batch(&events[i..j]));
            i = j;
        } else {
            if let Some(msg) = event_to_message(&events[i]) {
                messages.push(msg);
            }
            i += 1;
        }
    }
    messages
}

/// One assistant message for a contiguous action batch: the first action's
/// thought as content, every action rendered as a structured tool call.
fn combine_batch(batch: &[Event]) -> LlmMessage {
    let mut thought = String::new();
    let mut tool_calls = Vec::with_capacity(batch.len());
    for (idx, event) in batch.iter().enumerate() {
        if let EventKind::Action {
            thought: t,
            tool_name,
            arguments,
            tool_call_id,
            ..
        } = &event.kind
        {
            if idx == 0 {
                thought = t.clone();
            }
            tool_calls.push(ToolCallPayload {
                id: tool_call_id.clone(),
                name: tool_name.clone(),
                arguments: arguments.to_string(),
            });
        }
    }
    LlmMessage::assistant_with_calls(MessageContent::Text(thought), tool_calls)
}

fn event_to_message(event: &Event) -> Option<LlmMessage> {
    match &event.kind {
        EventKind::SystemPrompt { text, .. } => Some(LlmMessage::system(text.clone())),
        EventKind::Message { content, .. } => {
            let role = match event.source {
                Source::Agent => Role::Assistant,
                // The environment speaks to the model as the user.
                Source::User | Source::Environment => Role::User,
            };
            let msg_content = match content.as_slice() {
                [drover_model::ContentPart::Text { text }] => MessageContent::Text(text.clone()),
                parts => MessageContent::Parts(parts.to_vec()),
            };
            Some(LlmMessage {
                role,
                content: msg_content,
                tool_calls: Vec::new(),
                tool_call_id: None,
                name: None,
            })
        }
        EventKind::Observation {
            tool_call_id,
            tool_name,
            content,
            ..
        } => Some(LlmMessage::tool_result(
            tool_call_id.clone(),
            tool_name.clone(),
            content.clone(),
        )),
        // The model sees recoverable errors as user input by convention.
        EventKind::AgentError { error, .. } => Some(LlmMessage::user(error.clone())),
        // Condensations shape the view; they are never themselves projected.
        EventKind::Condensation { .. } => None,
        EventKind::Action { .. } => unreachable!("actions are handled by batch collection"),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use drover_model::ContentPart;
    use serde_json::json;

    fn action(thought: &str, name: &str, args: serde_json::Value, tc: &str, batch: &str) -> Event {
        Event::action(thought, name, args, tc, batch)
    }

    #[test]
    fn system_prompt_projects_to_system_role() {
        let events = vec![Event::system_prompt("be helpful", vec![])];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[0].as_text(), Some("be helpful"));
    }

    #[test]
    fn user_and_agent_messages_keep_their_roles() {
        let events = vec![
            Event::user_message(vec![ContentPart::text("hi")], vec![]),
            Event::agent_message("hello"),
        ];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].role, Role::Assistant);
    }

    #[test]
    fn environment_message_projects_as_user() {
        let events = vec![Event::environment_message("<env>repo: x</env>")];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs[0].role, Role::User);
    }

    #[test]
    fn agent_error_projects_as_user() {
        let events = vec![Event::agent_error("schema failure", Some("t9".into()))];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs[0].role, Role::User);
        assert!(msgs[0].as_text().unwrap().contains("schema failure"));
    }

    #[test]
    fn single_action_becomes_assistant_with_one_tool_call() {
        let events = vec![action("I'll echo", "echo", json!({"text": "x"}), "t1", "b1")];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::Assistant);
        assert_eq!(msgs[0].as_text(), Some("I'll echo"));
        assert_eq!(msgs[0].tool_calls.len(), 1);
        assert_eq!(msgs[0].tool_calls[0].id, "t1");
        assert_eq!(msgs[0].tool_calls[0].name, "echo");
    }

    #[test]
    fn batch_of_actions_becomes_one_assistant_message_in_order() {
        let events = vec![
            action("do both", "a", json!({}), "t1", "b1"),
            action("", "b", json!({}), "t2", "b1"),
        ];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs.len(), 1, "one batch must yield exactly one assistant message");
        let ids: Vec<&str> = msgs[0].tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(msgs[0].as_text(), Some("do both"), "thought comes from the first action");
    }

    #[test]
    fn separate_batches_become_separate_assistant_messages() {
        let events = vec![
            action("first", "a", json!({}), "t1", "b1"),
            Event::observation("x", "t1", "a", "r1", false),
            action("second", "a", json!({}), "t2", "b2"),
        ];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].tool_calls[0].id, "t1");
        assert_eq!(msgs[1].role, Role::Tool);
        assert_eq!(msgs[2].tool_calls[0].id, "t2");
    }

    #[test]
    fn observation_projects_to_tool_message_with_id_and_name() {
        let events = vec![Event::observation("a1", "t1", "echo", "ECHO:x", false)];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs[0].role, Role::Tool);
        assert_eq!(msgs[0].tool_call_id.as_deref(), Some("t1"));
        assert_eq!(msgs[0].name.as_deref(), Some("echo"));
        assert_eq!(msgs[0].as_text(), Some("ECHO:x"));
    }

    #[test]
    fn condensation_events_are_not_projected() {
        let events = vec![
            Event::user_message(vec![ContentPart::text("hi")], vec![]),
            Event::condensation(vec![], Some("summary".into()), Some(0)),
        ];
        let msgs = events_to_messages(&events);
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn projection_is_pure() {
        let events = vec![
            Event::system_prompt("p", vec![]),
            action("t", "echo", json!({"text": "x"}), "t1", "b1"),
            Event::observation("a", "t1", "echo", "out", false),
        ];
        let a = events_to_messages(&events);
        let b = events_to_messages(&events);
        assert_eq!(a, b);
    }

    #[test]
    fn action_arguments_serialize_into_tool_call_json() {
        let events = vec![action("", "add", json!({"a": 1, "b": 2}), "t1", "b1")];
        let msgs = events_to_messages(&events);
        let parsed: serde_json::Value =
            serde_json::from_str(&msgs[0].tool_calls[0].arguments).unwrap();
        assert_eq!(parsed, json!({"a": 1, "b": 2}));
    }
}
