//! OpenAI chat model, the primary remote backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{DEFAULT_BACKEND_TIMEOUT, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::error::{BackendError, BackendResult};
use crate::fetchers::http::api_client;
use crate::security::{ModelCredentials, SecretString};
use crate::traits::model::LanguageModel;

/// OpenAI chat completions client.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: api_client(DEFAULT_BACKEND_TIMEOUT),
            api_key,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    /// Build from configured credentials. Fails when the key is absent.
    pub fn from_credentials(creds: &ModelCredentials) -> BackendResult<Self> {
        let key = creds
            .api_key
            .clone()
            .ok_or_else(|| BackendError::unconfigured("OPENAI_API_KEY not set"))?;
        let mut model = Self::new(key).with_model(creds.model.clone());
        if let Some(url) = &creds.base_url {
            model = model.with_base_url(url.clone());
        }
        Ok(model)
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout (default 60s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = api_client(timeout);
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, system: &str, user: &str) -> BackendResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: Some(0.2),
            max_tokens: Some(2048),
        };

        debug!(model = %self.model, "OpenAI chat request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &error_text));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(format!("OpenAI: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| BackendError::invalid_response("no content from OpenAI"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
