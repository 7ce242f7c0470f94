// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

// ─── Content part types ───────────────────────────────────────────────────────

/// A single content part in a multi-part message.
///
/// Used for user and agent messages that mix text with image references.
/// Images are represented as data URLs (`data:<mime>;base64,<b64>`) or HTTPS
/// URLs for providers that accept remote references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { url: String },
}

impl ContentPart {
    /// Convenience constructor for a plain text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Convenience constructor for an image reference part.
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }
}

/// The content of a message – either a plain string or structured parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Lossy plain-text projection: text parts joined with newlines, images
    /// omitted.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Return the plain text when this content is a single text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Parts(parts) if parts.len() == 1 => match &parts[0] {
                ContentPart::Text { text } => Some(text),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One chat-format message as sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Structured tool calls; only meaningful for assistant messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallPayload>,
    /// Id of the tool call this message answers; only set for tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name; only set for tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LlmMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Construct a user message from a list of content parts (text + images).
    ///
    /// An empty list falls back to empty text; a single text part collapses
    /// to `MessageContent::Text` for cleaner serialization.
    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        let content = if parts.is_empty() {
            MessageContent::Text(String::new())
        } else if parts.len() == 1 {
            if let ContentPart::Text { text } = &parts[0] {
                MessageContent::Text(text.clone())
            } else {
                MessageContent::Parts(parts)
            }
        } else {
            MessageContent::Parts(parts)
        };
        Self {
            role: Role::User,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Assistant message carrying structured tool calls alongside its text.
    pub fn assistant_with_calls(content: MessageContent, tool_calls: Vec<ToolCallPayload>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-result message answering one tool call.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Return the plain text of this message, if it has exactly one text part.
    pub fn as_text(&self) -> Option<&str> {
        self.content.as_text()
    }
}

/// One structured tool call inside an assistant message or model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallPayload {
    /// Opaque identifier assigned by the model (forwarded verbatim).
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// A tool declaration provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: serde_json::Value,
}

// ─── Request / response ───────────────────────────────────────────────────────

/// One completion request sent to a model client.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolSchema>,
}

/// The model's answer to one completion request.
///
/// Transport failures are not part of this union; they surface as
/// [`crate::ModelError`] from [`crate::LlmClient::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResponse {
    /// Free text plus zero or more tool calls.  An empty `tool_calls` list
    /// means the model considers the task complete.
    AssistantText {
        thought: String,
        tool_calls: Vec<ToolCallPayload>,
    },
    /// The model declined to answer.
    Refusal { reason: String },
}

impl ModelResponse {
    /// Final text response with no tool calls.
    pub fn text(thought: impl Into<String>) -> Self {
        Self::AssistantText {
            thought: thought.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Response consisting of tool calls with an accompanying thought.
    pub fn tool_calls(
        thought: impl Into<String>,
        tool_calls: impl IntoIterator<Item = ToolCallPayload>,
    ) -> Self {
        Self::AssistantText {
            thought: thought.into(),
            tool_calls: tool_calls.into_iter().collect(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Message construction ──────────────────────────────────────────────────

    #[test]
    fn message_user_sets_role_and_text() {
        let m = LlmMessage::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
    }

    #[test]
    fn message_tool_result_carries_id_and_name() {
        let m = LlmMessage::tool_result("t1", "echo", "output");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("t1"));
        assert_eq!(m.name.as_deref(), Some("echo"));
        assert_eq!(m.as_text(), Some("output"));
    }

    #[test]
    fn user_with_parts_collapses_single_text() {
        let m = LlmMessage::user_with_parts(vec![ContentPart::text("hi")]);
        assert_eq!(m.content, MessageContent::Text("hi".into()));
    }

    #[test]
    fn user_with_parts_keeps_mixed_parts() {
        let m = LlmMessage::user_with_parts(vec![
            ContentPart::text("what is this?"),
            ContentPart::image("data:image/png;base64,XYZ"),
        ]);
        assert!(matches!(m.content, MessageContent::Parts(ref p) if p.len() == 2));
        assert!(m.as_text().is_none());
    }

    #[test]
    fn assistant_with_calls_carries_tool_calls() {
        let m = LlmMessage::assistant_with_calls(
            "thinking".into(),
            vec![ToolCallPayload {
                id: "t1".into(),
                name: "echo".into(),
                arguments: r#"{"text":"x"}"#.into(),
            }],
        );
        assert_eq!(m.tool_calls.len(), 1);
        assert_eq!(m.tool_calls[0].name, "echo");
    }

    // ── Content projection ────────────────────────────────────────────────────

    #[test]
    fn to_text_joins_text_parts_and_drops_images() {
        let c = MessageContent::Parts(vec![
            ContentPart::text("a"),
            ContentPart::image("data:image/png;base64,Q"),
            ContentPart::text("b"),
        ]);
        assert_eq!(c.to_text(), "a\nb");
    }

    // ── Serialisation ─────────────────────────────────────────────────────────

    #[test]
    fn plain_message_omits_optional_fields() {
        let json = serde_json::to_string(&LlmMessage::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
        assert!(!json.contains("\"name\""));
    }

    #[test]
    fn message_round_trips_through_json() {
        let original = LlmMessage::tool_result("id-1", "grep", "3 matches");
        let json = serde_json::to_string(&original).unwrap();
        let back: LlmMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn content_part_image_round_trip() {
        let p = ContentPart::image("https://example.com/x.png");
        let json = serde_json::to_string(&p).unwrap();
        let back: ContentPart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
