//! Generation capability.
//!
//! Defines the [`Generator`] trait (the injected "given prompt, return
//! text" capability) and the production implementation backed by a local
//! Ollama instance's `/api/chat` endpoint. Generation is single-shot and
//! non-streaming: one call per question, with conversation history passed
//! as prior chat messages.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::ChatTurn;

/// Injected text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for `prompt`, given the accumulated conversation
    /// history. Synchronous from the caller's point of view: the full answer
    /// is returned in one piece.
    async fn complete(&self, prompt: &str, history: &[ChatTurn]) -> Result<String>;

    /// Model identifier (e.g. `"gemma3:4b"`).
    fn model_name(&self) -> &str;
}

/// Generation provider using a local Ollama instance.
pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.clone(),
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn complete(&self, prompt: &str, history: &[ChatTurn]) -> Result<String> {
        let mut messages: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": turn.role.as_str(),
                    "content": turn.content,
                })
            })
            .collect();
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url,
                    e
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama chat API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_message_content() {
        let json = serde_json::json!({
            "model": "gemma3:4b",
            "message": { "role": "assistant", "content": "The answer is 42." },
            "done": true,
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "The answer is 42.");
    }

    #[test]
    fn chat_response_without_content_is_an_error() {
        let json = serde_json::json!({ "done": true });
        assert!(parse_chat_response(&json).is_err());
    }
}
