//! OpenAI-compatible chat completions backend (OpenAI, Ollama, vLLM, ...).

use async_trait::async_trait;
use fincat_core::AiConfig;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::{AiBackend, AiError, AiPrompt, AiSuggestion};

const SYSTEM_PROMPT: &str = "You classify bank transactions for a small business. \
Choose exactly one category from the list you are given, and a cost center only if one clearly applies. \
Answer with a JSON object with the keys category_id, category_name, cost_center_id, cost_center_name, \
confidence (a number between 0 and 1) and reasoning (one short sentence). \
If no category is offered, propose a short snake_case id and a readable name.";

pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, AiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature: 0.0,
        })
    }

    /// `None` when no endpoint is configured: the AI fallback is then absent.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiError> {
        let Some(endpoint) = config.endpoint.as_deref() else {
            return Ok(None);
        };
        let mut backend = Self::new(endpoint, config.model.clone(), config.api_key.clone())?;
        backend.temperature = config.temperature;
        Ok(Some(backend))
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn user_message(prompt: &AiPrompt<'_>) -> String {
    let mut msg = format!(
        "Description: {}\nAmount: {}\nType: {}\n",
        prompt.description, prompt.amount, prompt.transaction_type
    );
    if !prompt.catalog.categories.is_empty() {
        msg.push_str("Categories:\n");
        for c in &prompt.catalog.categories {
            msg.push_str(&format!("- {}: {}\n", c.id, c.name));
        }
    }
    if !prompt.catalog.cost_centers.is_empty() {
        msg.push_str("Cost centers:\n");
        for c in &prompt.catalog.cost_centers {
            msg.push_str(&format!("- {}: {}\n", c.id, c.name));
        }
    }
    msg
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn suggest(&self, prompt: &AiPrompt<'_>) -> Result<AiSuggestion, AiError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message(prompt),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            stream: false,
        };

        let mut request = self.client.post(self.chat_completions_url());
        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Malformed(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Malformed("no choices in response".to_string()))?;

        serde_json::from_str(&content).map_err(|e| AiError::Malformed(e.to_string()))
    }
}
