//! Text generation collaborator and its chat-completion implementation.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// API credential passed explicitly into every call. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system_message: String,
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

/// Model and sampling settings shared by every call in a batch.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub api_key: ApiKey,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl GenerationSettings {
    pub fn request(&self, system_message: &str, prompt: String) -> GenerationRequest {
        GenerationRequest {
            system_message: system_message.to_string(),
            prompt,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("service returned empty content")]
    Empty,
}

pub trait Generator {
    /// Returns the reply text trimmed of surrounding whitespace.
    fn generate(&self, api_key: &ApiKey, request: &GenerationRequest)
        -> Result<String, GenerationError>;
}

pub struct ChatCompletionClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl ChatCompletionClient {
    /// `api_base` is e.g. `https://api.openai.com/v1`. `timeout` bounds each
    /// request end to end.
    pub fn new(api_base: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub fn request_body(request: &GenerationRequest) -> Value {
    json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "presence_penalty": request.presence_penalty,
        "frequency_penalty": request.frequency_penalty,
        "messages": [
            { "role": "system", "content": request.system_message },
            { "role": "user", "content": request.prompt },
        ],
    })
}

pub fn parse_response(json: &Value) -> Result<String, GenerationError> {
    let content = json
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| GenerationError::Decode("missing choices[0].message.content".to_string()))?;

    let content = content.trim();
    if content.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(content.to_string())
}

impl Generator for ChatCompletionClient {
    fn generate(
        &self,
        api_key: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        debug!(model = %request.model, prompt_len = request.prompt.len(), "chat completion request");

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", api_key.expose()))
            .send_json(request_body(request));

        let json: Value = match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| GenerationError::Decode(format!("JSON parse error: {e}")))?,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(GenerationError::Status { code, body });
            }
            Err(ureq::Error::Transport(t)) => return Err(GenerationError::Transport(t.to_string())),
        };

        parse_response(&json)
    }
}
