
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Sampling temperature for chat completions.
const CHAT_TEMPERATURE: f32 = 0.5;

/// Number of completion choices requested per call.
const COMPLETION_COUNT: u32 = 1;

/// Client for the OpenAI embeddings and chat-completions endpoints.
///
/// Remote errors propagate to the caller unmodified; no retry is performed
/// here.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_base: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    n: u32,
    temperature: f32,
}

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

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            api_base: config.openai.api_base.clone(),
            api_key: config.openai.api_key.clone(),
            embedding_model: config.openai.embedding_model.clone(),
            chat_model: config.openai.chat_model.clone(),
            agent,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    /// Compute the embedding vector for a text.
    ///
    /// Newlines are collapsed to spaces before the call. Text that is empty
    /// after normalization yields `Ok(None)` without touching the remote
    /// service; callers treat that as a defined absence, not an error.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let normalized = text.replace('\n', " ");
        if normalized.is_empty() {
            debug!("Skipping embedding for empty text");
            return Ok(None);
        }

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: vec![normalized],
        };

        let url = self
            .api_base
            .join("/v1/embeddings")
            .context("Failed to build embeddings URL")?;

        debug!("Requesting embedding from {}", url);

        let response_text = self
            .post_json(&url, &request)
            .context("Embedding request failed")?;

        let response: EmbeddingResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        let datum = response.data.into_iter().next().ok_or_else(|| {
            crate::CopilotError::Embedding("response contained no data".to_string())
        })?;

        debug!("Received embedding with {} dimensions", datum.embedding.len());
        Ok(Some(datum.embedding))
    }

    /// Request a single chat completion for a message sequence and return
    /// the trimmed content of the first choice.
    #[inline]
    pub fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages,
            n: COMPLETION_COUNT,
            temperature: CHAT_TEMPERATURE,
        };

        let url = self
            .api_base
            .join("/v1/chat/completions")
            .context("Failed to build chat completions URL")?;

        debug!("Requesting chat completion from {}", url);

        let response_text = self
            .post_json(&url, &request)
            .context("Chat completion request failed")?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            crate::CopilotError::Chat("completion returned no choices".to_string())
        })?;

        Ok(choice.message.content.trim().to_string())
    }

    fn post_json<T: Serialize>(&self, url: &Url, request: &T) -> Result<String> {
        let request_json = serde_json::to_string(request).context("Failed to serialize request")?;

        self.agent
            .post(url.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key).as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(Into::into)
    }
}
