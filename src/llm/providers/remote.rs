use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, parse_reply, send_json};
use crate::config::LlmConfig;
use crate::llm::{ChatMessage, CompletionClient, CompletionOptions, LlmError};

/// OpenAI-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionReply {
    fn into_content(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseError("completion had no content".to_string()))
    }
}

fn required(value: &Option<String>, what: &str) -> Result<String, LlmError> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LlmError::ConfigError(format!("{} is required for the remote backend", what)))
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            api_url: required(&config.api_url, "llm.api_url")?,
            api_key: required(&config.api_key, "llm.api_key")?,
            http: http_client(config.timeout_secs)?,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for RemoteLlmProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        debug!("Sending {} messages to {}", messages.len(), self.api_url);

        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let request = self.http.post(&self.api_url).bearer_auth(&self.api_key);

        let text = send_json("Completion API", request, &body).await?;
        parse_reply::<CompletionReply>("Completion API", &text)?.into_content()
    }
}
