//! Generative text model seam.
//!
//! The pipeline only ever needs "prompt in, text out", so backends implement
//! the single-method [`TextModel`] trait. Each backend applies the configured
//! per-request timeout and maps transport failures to
//! [`ScribeError::ModelUnavailable`] / [`ScribeError::ModelTimeout`].

pub mod gemini;
pub mod ollama;
pub mod scripted;

use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelProvider};
use crate::error::{Result, ScribeError};

/// One prompt/response exchange with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Standing instruction, sent as the system prompt where supported.
    pub system: Option<String>,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_output_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub const fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A generative text model.
pub trait TextModel {
    /// Send one request and return the model's text.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Human-readable backend and model name, for logs and diagnostics.
    fn describe(&self) -> String;
}

/// Build the configured model backend.
pub fn build_model(config: &ModelConfig) -> Result<Box<dyn TextModel>> {
    match config.provider {
        ModelProvider::Gemini => Ok(Box::new(gemini::GeminiClient::new(config)?)),
        ModelProvider::Ollama => Ok(Box::new(ollama::OllamaClient::new(config)?)),
    }
}

/// Map a `reqwest` failure onto the model error kinds.
pub(crate) fn transport_error(err: &reqwest::Error, timeout_secs: u64) -> ScribeError {
    if err.is_timeout() {
        ScribeError::ModelTimeout(timeout_secs)
    } else {
        ScribeError::ModelUnavailable(err.to_string())
    }
}

/// Map a failure while reading the response body. The request timeout also
/// covers the body, so a stalled body is still a timeout.
pub(crate) fn decode_error(err: &reqwest::Error, timeout_secs: u64, backend: &str) -> ScribeError {
    if err.is_timeout() {
        ScribeError::ModelTimeout(timeout_secs)
    } else {
        ScribeError::ModelUnavailable(format!("invalid {backend} response: {err}"))
    }
}

/// Shared blocking HTTP client with the per-call timeout applied.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("replyscribe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ScribeError::Config(format!("HTTP client: {e}")))
}
