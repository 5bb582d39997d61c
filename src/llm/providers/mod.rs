pub mod ollama;
pub mod remote;

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use super::LlmError;

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::ConnectionError(e.to_string()))
}

/// Sends `body` as JSON and hands back the raw response text. Non-2xx
/// statuses become `ResponseError` carrying whatever body the server sent.
pub(crate) async fn send_json<T: Serialize + ?Sized>(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &T,
) -> Result<String, LlmError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

    let status = response.status();
    let text = response.text().await.map_err(|e| {
        LlmError::ResponseError(format!("{} response body unreadable: {}", provider, e))
    })?;

    if !status.is_success() {
        error!("{} answered {}: {}", provider, status, text);
        return Err(LlmError::ResponseError(format!(
            "{} answered {}: {}",
            provider, status, text
        )));
    }

    debug!("{} replied with {} bytes", provider, text.len());
    Ok(text)
}

pub(crate) fn parse_reply<'de, R: serde::Deserialize<'de>>(
    provider: &str,
    text: &'de str,
) -> Result<R, LlmError> {
    serde_json::from_str(text).map_err(|e| {
        error!("Unexpected {} payload: {}", provider, e);
        LlmError::ResponseError(format!("unexpected {} payload: {}", provider, e))
    })
}
