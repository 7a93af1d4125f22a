// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation collaborator with queued replies.

use std::collections::VecDeque;

use async_trait::async_trait;
use chorus_core::{ChorusError, GenerationRequest, Generator};
use tokio::sync::Mutex;

/// Replies are popped from a FIFO queue; when it is empty, "mock reply" is
/// returned. Every request is captured.
#[derive(Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::default(),
        }
    }

    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(reply.into()));
    }

    /// Queue a generation failure.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().await.push_back(Err(message.into()));
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ChorusError> {
        self.requests.lock().await.push(request);
        match self.replies.lock().await.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ChorusError::generation(message)),
            None => Ok("mock reply".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            api_key: "k".into(),
            model: "m".into(),
            system_prompt: String::new(),
            history: Vec::new(),
            prompt: prompt.into(),
        }
    }

    #[tokio::test]
    async fn queued_replies_then_default() {
        let generator = MockGenerator::with_replies(["first"]);
        generator.push_failure("quota exceeded").await;

        assert_eq!(generator.generate(request("a")).await.unwrap(), "first");
        assert!(generator.generate(request("b")).await.is_err());
        assert_eq!(generator.generate(request("c")).await.unwrap(), "mock reply");
        assert_eq!(generator.call_count().await, 3);
    }
}
