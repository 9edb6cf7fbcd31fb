//! OpenAI-compatible chat-completions provider (DeepSeek by default).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::provider::{ProviderError, Result, TextGenerator};
use crate::config;

pub struct DeepSeekProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

impl DeepSeekProvider {
    pub fn new(client: Client, api_key: impl Into<String>, llm: &config::Llm) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: llm.model.clone(),
        }
    }
}

/// Pull the reply text out of a completion body.
///
/// Looks at `choices[0].message.content`, then `output_text`, then
/// `data.output_text`; anything else is returned as the serialized body so
/// the caller can still fall back to keyword matching.
pub(crate) fn extract_reply(body: &Value) -> String {
    if let Some(choices) = body.get("choices") {
        if let Some(content) = choices
            .get(0)
            .and_then(|c| c.pointer("/message/content"))
            .and_then(Value::as_str)
        {
            return content.to_string();
        }
    }
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(text) = body.pointer("/data/output_text").and_then(Value::as_str) {
        return text.to_string();
    }
    body.to_string()
}

#[async_trait]
impl TextGenerator for DeepSeekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
        };

        tracing::debug!("Sending completion request to {} ({})", self.base_url, self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(extract_reply(&body))
    }
}
