// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible Chat Completions endpoints.
//!
//! Accounts bring their own API keys, so authentication is attached per
//! request rather than as a default header. Failures are not retried.

use std::time::Duration;

use chorus_core::ChorusError;
use tracing::debug;

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(timeout: Duration) -> Result<Self, ChorusError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChorusError::Generation {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }

    /// POST `request` to `{base_url}/chat/completions`.
    pub async fn complete(
        &self,
        base_url: &str,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChorusError> {
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ChorusError::Generation {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(%status, model = %request.model, "completion response received");

        let body = response.text().await.map_err(|e| ChorusError::Generation {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(ChorusError::generation(message));
        }

        serde_json::from_str(&body).map_err(|e| ChorusError::Generation {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}
