//! Ollama `/api/chat` backend, for running against a local model.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{decode_error, http_client, transport_error, CompletionRequest, TextModel};
use crate::config::ModelConfig;
use crate::error::{Result, ScribeError};

#[derive(Debug)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.endpoint().to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });
    ChatRequest {
        model,
        messages,
        stream: false,
        options: ChatOptions {
            temperature: request.temperature,
            num_predict: request.max_output_tokens,
        },
    }
}

impl TextModel for OllamaClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!("Sending request to Ollama");
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&build_body(&self.model, request))
            .send()
            .map_err(|e| transport_error(&e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = %status, body = %body, "Ollama request failed");
            return Err(ScribeError::ModelUnavailable(format!(
                "Ollama status {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| decode_error(&e, self.timeout_secs, "Ollama"))?;
        Ok(parsed.message.content)
    }

    fn describe(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
