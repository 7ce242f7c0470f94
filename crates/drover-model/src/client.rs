// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{CompletionRequest, ModelError, ModelResponse};

/// Abstract model client.
///
/// Implementations own the wire protocol, per-request timeouts, and prompt
/// formatting; the runtime core only depends on this contract.  `complete`
/// must honor the cancel token by aborting transport and returning
/// [`ModelError::Cancelled`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Human-readable client name for status display.
    fn name(&self) -> &str;

    /// Send one completion request and return the model's typed response.
    async fn complete(
        &self,
        req: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError>;
}
