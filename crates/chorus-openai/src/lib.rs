// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible reply generation for the Chorus session engine.
//!
//! [`OpenAiGenerator`] implements [`Generator`] over the Chat Completions API.
//! Models whose name starts with `deepseek` are sent to the DeepSeek base URL;
//! everything else goes to the OpenAI base URL.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use chorus_config::GenerationConfig;
use chorus_core::{ChatRole, ChorusError, GenerationRequest, Generator};
use tracing::debug;

use crate::client::OpenAiClient;
use crate::types::{ApiMessage, ChatCompletionRequest};

pub struct OpenAiGenerator {
    client: OpenAiClient,
    config: GenerationConfig,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, ChorusError> {
        Ok(Self {
            client: OpenAiClient::new(Duration::from_secs(config.timeout_secs))?,
            config: config.clone(),
        })
    }

    /// Base URL serving `model`.
    pub fn base_url_for(&self, model: &str) -> &str {
        if model.to_ascii_lowercase().starts_with("deepseek") {
            &self.config.deepseek_base_url
        } else {
            &self.config.base_url
        }
    }

    /// System prompt, history, then the new user prompt.
    fn build_request(&self, request: &GenerationRequest, model: &str) -> ChatCompletionRequest {
        let system_prompt = if request.system_prompt.trim().is_empty() {
            self.config.default_system_prompt.as_str()
        } else {
            request.system_prompt.as_str()
        };

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ApiMessage::new("system", system_prompt));
        for turn in &request.history {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(ApiMessage::new(role, turn.content.clone()));
        }
        messages.push(ApiMessage::new("user", request.prompt.clone()));

        ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ChorusError> {
        if request.api_key.trim().is_empty() {
            return Err(ChorusError::generation("no API key configured for account"));
        }
        let model = if request.model.trim().is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let body = self.build_request(&request, model);
        let base_url = self.base_url_for(model);
        debug!(%model, %base_url, turns = request.history.len(), "requesting completion");

        let response = self
            .client
            .complete(base_url, &request.api_key, &body)
            .await?;
        response
            .first_text()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ChorusError::generation("completion contained no choices"))
    }
}

#[cfg(test)]
mod tests {
    use chorus_core::ChatTurn;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn generator(server: &MockServer) -> OpenAiGenerator {
        let config = GenerationConfig {
            base_url: format!("{}/openai/v1", server.uri()),
            deepseek_base_url: format!("{}/deepseek", server.uri()),
            ..GenerationConfig::default()
        };
        OpenAiGenerator::new(&config).unwrap()
    }

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest {
            api_key: "sk-account".into(),
            model: model.into(),
            system_prompt: "Be brief.".into(),
            history: vec![ChatTurn::user("earlier"), ChatTurn::assistant("reply")],
            prompt: "what now?".into(),
        }
    }

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    #[tokio::test]
    async fn sends_history_and_prompt_with_account_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-account"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "earlier"},
                    {"role": "assistant", "content": "reply"},
                    {"role": "user", "content": "what now?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  sure thing \n")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = generator(&server).generate(request("gpt-4o")).await.unwrap();
        assert_eq!(reply, "sure thing");
    }

    #[tokio::test]
    async fn deepseek_models_use_deepseek_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deepseek/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = generator(&server)
            .generate(request("deepseek-chat"))
            .await
            .unwrap();
        assert_eq!(reply, "hi");
    }

    #[tokio::test]
    async fn empty_model_and_prompt_fall_back_to_defaults() {
        let server = MockServer::start().await;
        let defaults = GenerationConfig::default();
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "model": defaults.default_model,
                "messages": [{"role": "system", "content": defaults.default_system_prompt}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request("");
        req.system_prompt = String::new();
        req.history.clear();
        assert_eq!(generator(&server).generate(req).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let mut req = request("gpt-4o");
        req.api_key = "  ".into();
        let err = generator(&server).generate(req).await.unwrap_err();
        assert!(matches!(err, ChorusError::Generation { .. }));
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_exceeded", "message": "slow down"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate(request("gpt-4o"))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("rate_limit_exceeded"), "got: {err}");
    }

    #[tokio::test]
    async fn response_without_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        assert!(generator(&server).generate(request("gpt-4o")).await.is_err());
    }
}
