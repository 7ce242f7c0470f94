// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// Used for config fields that should be enabled unless the user explicitly
/// sets them to `false`.  `#[serde(default)]` on a `bool` always falls back
/// to `bool::default()` (i.e. `false`), so a named function is required.
fn default_true() -> bool {
    true
}

fn default_max_iter_per_run() -> u32 {
    500
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

fn default_retry_factor() -> f64 {
    2.0
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_retry_max_attempts() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Options controlling the conversation controller and step engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Hard cap on steps executed by a single `run()` call.
    #[serde(default = "default_max_iter_per_run")]
    pub max_iter_per_run: u32,

    /// When `false`, tool calls within one batch always run sequentially,
    /// regardless of each tool's own `parallel_safe` declaration.
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,

    /// When `true`, observations arriving for actions of a cancelled run are
    /// discarded.  When `false`, they are appended with an error payload so
    /// the log records the interruption per call.
    #[serde(default = "default_true")]
    pub drop_late_observations: bool,

    /// When `true`, `send_message` issued while `run()` is mid-step blocks on
    /// the state lock and lands after the current step's events.  When
    /// `false`, such a call is rejected with a busy error instead.
    #[serde(default = "default_true")]
    pub reentrant_send_message: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_iter_per_run: default_max_iter_per_run(),
            parallel_tool_calls: true,
            drop_late_observations: true,
            reentrant_send_message: true,
        }
    }
}

/// Exponential backoff applied to retryable model transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_retry_factor")]
    pub factor: f64,

    /// Ceiling on a single backoff delay, in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Total attempts (the initial call plus retries) before the failure is
    /// escalated to a fatal transport error.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_retry_base_delay_ms(),
            factor: default_retry_factor(),
            max_delay_ms: default_retry_max_delay_ms(),
            max_attempts: default_retry_max_attempts(),
        }
    }
}

impl RetryConfig {
    /// Backoff delay for the retry following failed attempt number `attempt`
    /// (1-based), clamped to `max_delay_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1);
        let raw = self.base_delay_ms as f64 * self.factor.powi(exp as i32);
        (raw as u64).min(self.max_delay_ms)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_defaults_match_documented_values() {
        let c = ConversationConfig::default();
        assert_eq!(c.max_iter_per_run, 500);
        assert!(c.parallel_tool_calls);
        assert!(c.drop_late_observations);
        assert!(c.reentrant_send_message);
    }

    #[test]
    fn retry_defaults_match_documented_values() {
        let r = RetryConfig::default();
        assert_eq!(r.base_delay_ms, 1_000);
        assert_eq!(r.factor, 2.0);
        assert_eq!(r.max_delay_ms, 30_000);
        assert_eq!(r.max_attempts, 5);
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        let r = RetryConfig::default();
        assert_eq!(r.delay_ms(1), 1_000);
        assert_eq!(r.delay_ms(2), 2_000);
        assert_eq!(r.delay_ms(3), 4_000);
        assert_eq!(r.delay_ms(4), 8_000);
        // 1s * 2^9 = 512s → clamped
        assert_eq!(r.delay_ms(10), 30_000);
    }

    #[test]
    fn empty_yaml_mapping_deserializes_to_defaults() {
        let c: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(c.conversation.max_iter_per_run, 500);
        assert_eq!(c.retry.max_attempts, 5);
    }

    #[test]
    fn partial_yaml_overrides_one_field_only() {
        let c: Config = serde_yaml::from_str("conversation:\n  max_iter_per_run: 7").unwrap();
        assert_eq!(c.conversation.max_iter_per_run, 7);
        assert!(c.conversation.parallel_tool_calls, "untouched fields keep defaults");
    }

    #[test]
    fn explicit_false_survives_default_true() {
        let c: Config =
            serde_yaml::from_str("conversation:\n  drop_late_observations: false").unwrap();
        assert!(!c.conversation.drop_late_observations);
    }
}
