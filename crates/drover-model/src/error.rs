// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Failures surfaced by a model client.
///
/// Callers never see the underlying transport exception; clients wrap it in
/// `Transport` with an explicit retryability flag.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model transport error: {message}")]
    Transport { retryable: bool, message: String },

    /// The in-flight request was aborted via the cancel token.
    #[error("model call cancelled")]
    Cancelled,
}

impl ModelError {
    /// Transient transport failure worth retrying (rate limit, 5xx, timeout).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            retryable: true,
            message: message.into(),
        }
    }

    /// Permanent transport failure (auth, malformed request, exhausted quota).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            retryable: false,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                retryable: true,
                ..
            }
        )
    }
}
