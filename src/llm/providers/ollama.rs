use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{http_client, parse_reply, send_json};
use crate::config::LlmConfig;
use crate::llm::{ChatMessage, CompletionClient, CompletionOptions, LlmError};

const DEFAULT_CHAT_URL: &str = "http://localhost:11434/api/chat";

/// Talks to a local Ollama daemon through its non-streaming `/api/chat` route.
pub struct OllamaProvider {
    http: reqwest::Client,
    chat_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            chat_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        info!("Asking Ollama model {} at {}", self.model, self.chat_url);

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: SamplingOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let text = send_json("Ollama", self.http.post(&self.chat_url), &body).await?;
        let reply: ChatReply = parse_reply("Ollama", &text)?;
        Ok(reply.message.content)
    }
}
