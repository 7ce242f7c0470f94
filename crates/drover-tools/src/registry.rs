// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{Capability, Observation, Tool, ToolCall};

/// A tool schema as presented to the model – mirrors the model crate's
/// `ToolSchema` but keeps this crate independent from it.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("tool `{0}` is already registered")]
    Duplicate(String),
}

/// Central registry binding tool names to their implementations.
///
/// Registration happens at construction time; after that the registry is
/// read-only and shared freely between the step engine and tool tasks.
/// The `allowed` capability set gates execution: a call that needs a
/// capability outside the set is answered with a failed observation instead
/// of running, so the model can see the refusal and adjust.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    allowed: Vec<Capability>,
}

impl ToolRegistry {
    /// Registry permitting both view and edit tools.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            allowed: vec![Capability::View, Capability::Edit],
        }
    }

    /// Registry that refuses to run tools requiring [`Capability::Edit`].
    pub fn read_only() -> Self {
        Self {
            tools: HashMap::new(),
            allowed: vec![Capability::View],
        }
    }

    /// Register a tool.  Re-registering an existing name is an error; use
    /// [`ToolRegistry::register_or_replace`] to overwrite deliberately.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    /// Register a tool, replacing any existing registration of the same name.
    pub fn register_or_replace(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Schemas for all registered tools, sorted by name for a stable prompt.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters().to_json_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// True when every capability the tool needs is in the allowed set.
    pub fn permits(&self, tool: &dyn Tool) -> bool {
        tool.capabilities().iter().all(|c| self.allowed.contains(c))
    }

    /// Execute one validated call.
    ///
    /// Unknown names and capability violations become failed observations
    /// rather than errors – the model observes them as tool results.
    pub async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> Observation {
        let Some(tool) = self.tools.get(&call.name) else {
            return Observation::err(&call.id, format!("unknown tool: {}", call.name));
        };
        if !self.permits(tool.as_ref()) {
            warn!(tool = %call.name, "tool call blocked by capability set");
            return Observation::err(
                &call.id,
                format!("tool `{}` is not permitted in read-only mode", call.name),
            );
        }
        tool.execute(call, cancel).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::schema::{Field, Schema};

    /// Minimal echo tool for registry tests.
    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters(&self) -> Schema {
            Schema::object([Field::required("text", "text to echo", Schema::String)])
        }
        async fn execute(&self, call: &ToolCall, _cancel: &CancellationToken) -> Observation {
            Observation::ok(&call.id, format!("echo:{}", call.args))
        }
    }

    /// Tool that declares it mutates the environment.
    struct WriteTool;

    #[async_trait]
    impl Tool for WriteTool {
        fn name(&self) -> &str {
            "write"
        }
        fn description(&self) -> &str {
            "writes a file"
        }
        fn parameters(&self) -> Schema {
            Schema::object([Field::required("path", "", Schema::String)])
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::View, Capability::Edit]
        }
        async fn execute(&self, call: &ToolCall, _cancel: &CancellationToken) -> Observation {
            Observation::ok(&call.id, "written")
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" }).unwrap();
        assert!(reg.get("echo").is_some());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" }).unwrap();
        let err = reg.register(EchoTool { name: "echo" }).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "echo"));
    }

    #[test]
    fn register_or_replace_overwrites() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "t" }).unwrap();
        reg.register_or_replace(EchoTool { name: "t" });
        assert_eq!(reg.names().len(), 1);
    }

    #[test]
    fn schemas_are_sorted_and_rendered() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "zeta" }).unwrap();
        reg.register(EchoTool { name: "alpha" }).unwrap();
        let schemas = reg.schemas();
        assert_eq!(schemas[0].name, "alpha");
        assert_eq!(schemas[1].name, "zeta");
        assert_eq!(schemas[0].parameters["type"], "object");
    }

    #[tokio::test]
    async fn execute_known_tool_succeeds() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" }).unwrap();
        let call = ToolCall {
            id: "1".into(),
            name: "echo".into(),
            args: json!({"text": "x"}),
        };
        let out = reg.execute(&call, &CancellationToken::new()).await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("echo:"));
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error_observation() {
        let reg = ToolRegistry::new();
        let call = ToolCall {
            id: "x".into(),
            name: "missing".into(),
            args: json!({}),
        };
        let out = reg.execute(&call, &CancellationToken::new()).await;
        assert!(out.is_error);
        assert!(out.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn read_only_registry_blocks_edit_tools() {
        let mut reg = ToolRegistry::read_only();
        reg.register(WriteTool).unwrap();
        let call = ToolCall {
            id: "w1".into(),
            name: "write".into(),
            args: json!({"path": "/tmp/f"}),
        };
        let out = reg.execute(&call, &CancellationToken::new()).await;
        assert!(out.is_error);
        assert!(out.content.contains("not permitted in read-only mode"));
    }

    #[tokio::test]
    async fn read_only_registry_still_runs_view_tools() {
        let mut reg = ToolRegistry::read_only();
        reg.register(EchoTool { name: "echo" }).unwrap();
        let call = ToolCall {
            id: "1".into(),
            name: "echo".into(),
            args: json!({"text": "x"}),
        };
        let out = reg.execute(&call, &CancellationToken::new()).await;
        assert!(!out.is_error);
    }
}
