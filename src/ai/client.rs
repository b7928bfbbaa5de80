use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion service returned no content")]
    EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Seam over the hosted chat-completion service.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct HttpChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpChatClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError> {
        let body = ChatBody {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let reply: ChatReply = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = extract_content(reply)?;
        debug!(chars = content.len(), model = %self.model, "completion received");
        Ok(content)
    }
}

fn extract_content(reply: ChatReply) -> Result<String, AiError> {
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(AiError::EmptyResponse)
}

#[cfg(test)]
pub mod stub {
    use super::*;
    use std::sync::Mutex;

    /// Canned backend: replies with `reply`, or fails when it is `None`.
    pub struct StubCompletion {
        pub reply: Option<String>,
        pub seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubCompletion {
        pub fn replying(text: &str) -> Self {
            Self { reply: Some(text.to_string()), seen: Mutex::new(Vec::new()) }
        }

        pub fn failing() -> Self {
            Self { reply: None, seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatCompletion for StubCompletion {
        async fn complete(&self, request: CompletionRequest) -> Result<String, AiError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().ok_or(AiError::EmptyResponse)
        }
    }
}
