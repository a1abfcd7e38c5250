//! Local Ollama `/api/chat` client.

use super::{send_error, CompletionProvider};
use crate::error::AssistantError;
use crate::session::{ChatRole, ChatTurn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

pub struct OllamaProvider {
    http_client: reqwest::Client,
    ollama_url: String,
    model_name: String,
    temperature: f64,
    timeout_seconds: u64,
}

impl OllamaProvider {
    pub fn new(
        ollama_url: &str,
        model_name: &str,
        temperature: f64,
        timeout_seconds: u64,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            ollama_url: ollama_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            temperature,
            timeout_seconds,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(
        &self,
        system: &str,
        history: &[ChatTurn],
        user_text: &str,
    ) -> Result<String, AssistantError> {
        let url = format!("{}/api/chat", self.ollama_url);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new("system", system));
        for turn in history {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(ChatMessage::new(role, &turn.text));
        }
        messages.push(ChatMessage::new("user", user_text));

        let request = OllamaChatRequest {
            model: self.model_name.clone(),
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!("Sending chat request with {} messages", request.messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(e, &self.ollama_url, self.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::from_status(status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Decode(e.to_string()))?;

        Ok(chat_response.message.content)
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
