use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RewriteConfig;
use crate::error::{Result, RetubeError};
use super::DescriptionRewriter;

const SYSTEM_PROMPT: &str = "Remove all information related to the original channel, \
including links, calls to subscribe, and mentions, while keeping the rest of the \
description intact.";

/// Chat completions request body (OpenAI-compatible)
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat completions response wrapper
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Rewriter backed by an OpenAI-compatible chat completions service
pub struct LlmRewriter {
    config: RewriteConfig,
    client: reqwest::Client,
}

impl LlmRewriter {
    pub fn new(config: RewriteConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
        }
    }
}

#[async_trait]
impl DescriptionRewriter for LlmRewriter {
    async fn rewrite(&self, text: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| RetubeError::Config("Rewrite API key not configured".to_string()))?;

        debug!("Rewriting description ({} chars) with model {}", text.len(), self.config.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(api_key)
            .json(&self.build_request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetubeError::Rewrite(format!("{}: {}", status, error_text)));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RetubeError::Rewrite("Service returned no content".to_string()))?;

        Ok(content)
    }
}
