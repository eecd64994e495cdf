//! Ollama LLM Provider
//!
//! Uses the native `/api/generate` endpoint with streaming disabled: one
//! prompt in, one JSON object out.

use crate::llm::{CompletionParams, LlmClient};
use crate::retry::PermanentError;
use anyhow::{Context, Result};
use entelgia_core::LlmConfig;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .context("Failed to build HTTP client")?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Determine if a status code is worth another attempt.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn build_generate_payload(model: &str, prompt: &str, params: &CompletionParams) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": {
            "temperature": params.temperature,
            "num_predict": params.max_tokens,
        }
    })
}

/// Extract the generated text from a non-streaming `/api/generate` reply.
pub(crate) fn parse_generate_response(resp_json: &Value) -> Result<String> {
    if let Some(err) = resp_json["error"].as_str() {
        anyhow::bail!("Ollama error: {}", err);
    }
    let text = resp_json["response"]
        .as_str()
        .context("Ollama response has no 'response' field")?;
    Ok(text.trim().to_string())
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String> {
        let payload = build_generate_payload(&self.model, prompt, &params);
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        let status = response.status();
        if !status.is_success() {
            let err_text = response.text().await.unwrap_or_default();
            let msg = format!("Ollama API Error ({}): {}", status, err_text);
            if is_retryable_status(status) {
                anyhow::bail!(msg);
            }
            return Err(PermanentError(msg).into());
        }

        let resp_json: Value = response
            .json()
            .await
            .context("Failed to decode Ollama response")?;
        parse_generate_response(&resp_json)
    }
}
