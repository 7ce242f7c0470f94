// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use regex::Regex;

use drover_model::ContentPart;

/// A keyword-triggered knowledge skill.
///
/// When one of its keywords appears in a user message, the skill's content is
/// appended to that message as an extra content part.  Each skill activates
/// at most once per conversation; the state tracks the activated names.
#[derive(Debug)]
pub struct KnowledgeSkill {
    pub name: String,
    pub content: String,
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl KnowledgeSkill {
    pub fn new(
        name: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
        content: impl Into<String>,
    ) -> Self {
        let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
        let patterns = keywords
            .iter()
            .filter_map(|k| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(k))).ok())
            .collect();
        Self {
            name: name.into(),
            content: content.into(),
            keywords,
            patterns,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whole-word, case-insensitive match of any keyword in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    fn render(&self) -> String {
        format!(
            "<knowledge source=\"{}\">\n{}\n</knowledge>",
            self.name, self.content
        )
    }
}

/// Static context injected by the embedder: an optional environment
/// description sent once, plus the knowledge skill set consulted on every
/// user message.
#[derive(Debug, Default)]
pub struct AgentContext {
    pub environment_context: Option<String>,
    skills: Vec<KnowledgeSkill>,
}

impl AgentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment_context(mut self, text: impl Into<String>) -> Self {
        self.environment_context = Some(text.into());
        self
    }

    pub fn with_skill(mut self, skill: KnowledgeSkill) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn skills(&self) -> &[KnowledgeSkill] {
        &self.skills
    }

    /// Content parts and names for the skills triggered by `text`, skipping
    /// any in `already_activated`.  Returns `None` when nothing triggered.
    pub fn augment(
        &self,
        text: &str,
        already_activated: &[String],
    ) -> Option<(Vec<ContentPart>, Vec<String>)> {
        let mut parts = Vec::new();
        let mut names = Vec::new();
        for skill in &self.skills {
            if already_activated.iter().any(|n| n == &skill.name) {
                continue;
            }
            if skill.matches(text) {
                parts.push(ContentPart::text(skill.render()));
                names.push(skill.name.clone());
            }
        }
        if names.is_empty() {
            None
        } else {
            Some((parts, names))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
