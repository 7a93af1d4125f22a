// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply text generation capability.

use async_trait::async_trait;

use crate::error::ChorusError;
use crate::types::ChatTurn;

/// Inputs for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub api_key: String,
    /// Empty selects the generator's default model.
    pub model: String,
    /// Empty selects the generator's default system prompt.
    pub system_prompt: String,
    /// Prior turns of this conversation, oldest first.
    pub history: Vec<ChatTurn>,
    /// The user turn to answer.
    pub prompt: String,
}

/// Produces reply text from a prompt and history.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    /// Returns the generated text; failures are reported as `ChorusError::Generation`.
    async fn generate(&self, request: GenerationRequest) -> Result<String, ChorusError>;
}
