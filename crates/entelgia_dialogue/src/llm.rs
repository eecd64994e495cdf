use crate::retry::{with_retry, RetryConfig};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Parameters for one completion, derived from the speaker's drives.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            max_tokens: 400,
        }
    }
}

impl CompletionParams {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }
}

/// The external completion service. Opaque: prompt in, text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String>;
}

/// Complete `prompt` under the session's timeout and retry policy.
pub async fn complete_with_retry(
    client: &Arc<dyn LlmClient>,
    retry: &RetryConfig,
    label: &str,
    prompt: &str,
    params: CompletionParams,
) -> Result<String> {
    with_retry(retry, label, || {
        let client = Arc::clone(client);
        let prompt = prompt.to_string();
        let params = params.clone();
        async move { client.complete(&prompt, params).await }
    })
    .await
}
