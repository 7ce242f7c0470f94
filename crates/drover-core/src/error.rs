// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

use crate::state::InvariantError;

/// Failures surfaced by the conversation controller.
///
/// Recoverable conditions (tool validation failures, refusals, tool
/// execution errors) never reach this type — they are recorded as events the
/// model can observe.  What remains is what the embedder must handle.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// `run()` is already active, or `send_message` arrived mid-run with
    /// `reentrant_send_message` disabled.
    #[error("conversation is busy")]
    Busy,

    /// The operation is not accepted in the current controller state.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// The model transport failed permanently (after retry exhaustion or a
    /// non-retryable failure).  The controller is in the errored state.
    #[error("model transport failed: {0}")]
    TransportFatal(String),

    /// A state invariant was violated.  Fatal; no recovery is attempted.
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_error_converts() {
        let e: ConversationError = InvariantError("broken".into()).into();
        assert!(e.to_string().contains("broken"));
    }
}
