//! OpenAI-compatible engine.
//!
//! Calls `POST {base_url}/chat/completions` with a per-category system prompt
//! and JSON response mode. Works with OpenAI and compatible servers (vLLM,
//! Ollama, LocalAI).

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::{AnalysisEngine, EngineError, EngineRequest};
use crate::settings::EngineSettings;

pub struct OpenAiEngine {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl OpenAiEngine {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(concat!("truthgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            max_tokens: 4096,
        })
    }

    /// Build an engine from settings, reading the key from the environment.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut engine = Self::new(&settings.base_url, &settings.model, settings.api_key())?;
        engine.max_tokens = settings.max_tokens;
        Ok(engine)
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
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
    #[serde(default)]
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
impl AnalysisEngine for OpenAiEngine {
    fn name(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &EngineRequest) -> Result<String, EngineError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::system_prompt(request),
                },
                ChatMessage {
                    role: "user",
                    content: prompts::user_message(request),
                },
            ],
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let mut http_request = self.client.post(self.chat_completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout
            } else {
                EngineError::Network(e)
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(EngineError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(EngineError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let engine = OpenAiEngine::new("http://localhost:11434/v1/", "llama3.2", None).unwrap();
        assert_eq!(
            engine.chat_completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(engine.name(), "llama3.2");
    }

    #[test]
    fn test_from_settings() {
        let mut settings = EngineSettings::default();
        settings.api_key_env = "TRUTHGATE_TEST_UNSET_KEY".to_string();
        settings.max_tokens = 512;
        let engine = OpenAiEngine::from_settings(&settings).unwrap();
        assert!(engine.api_key.is_none());
        assert_eq!(engine.max_tokens, 512);
    }
}
