//! Batch configuration.
//!
//! Values come from an optional TOML file; CLI flags override them and
//! anything left unset falls back to the defaults below. The API key is not
//! part of this struct.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};
use crate::generation::{ApiKey, GenerationSettings};
use crate::pipeline::FailurePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Host used to build each topic's full URL.
    pub domain: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// First outline column, 1-indexed.
    pub section_start_column: usize,
    /// Minimum spacing between generation calls.
    pub request_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub failure_policy: FailurePolicy,
    pub api_base: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            model: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            max_tokens: 2048,
            presence_penalty: 0.2,
            frequency_penalty: 0.2,
            section_start_column: 7,
            request_interval_secs: 7,
            request_timeout_secs: 120,
            failure_policy: FailurePolicy::Abort,
            api_base: "https://api.openai.com/v1".into(),
        }
    }
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BatchError::io(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BatchError::config(format!("invalid TOML: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(BatchError::config("domain must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(BatchError::config("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(BatchError::config("temperature must be within 0..=2"));
        }
        for (name, value) in [
            ("presence_penalty", self.presence_penalty),
            ("frequency_penalty", self.frequency_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(BatchError::config(format!("{name} must be within -2..=2")));
            }
        }
        if self.max_tokens == 0 {
            return Err(BatchError::config("max_tokens must be at least 1"));
        }
        if self.section_start_column == 0 {
            return Err(BatchError::config("section_start_column is 1-indexed"));
        }
        Ok(())
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn generation_settings(&self, api_key: ApiKey) -> GenerationSettings {
        GenerationSettings {
            api_key,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
        }
    }
}
