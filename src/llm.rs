use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ApiError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings for one completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: String,
    /// Endpoint base, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn new(model: &str, api_key: &str) -> Self {
        Self {
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// Client for OpenAI-compatible chat completion endpoints
///
/// The protocol is the fixed part; model, endpoint, and sampling settings
/// come from the `LlmConfig` passed with each call.
pub struct LlmClient {
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Send one user prompt and return the model's text reply
    #[instrument(skip(self, prompt, config), fields(model = %config.model))]
    pub async fn complete(&self, prompt: &str, config: &LlmConfig) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", config.base_url);

        let request = ChatRequest {
            model: config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        debug!("Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| ApiError::Transport {
                url: url.clone(),
                source: e,
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ApiError::MissingField {
                url,
                field: "choices".to_string(),
            })
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}
