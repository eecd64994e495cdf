//! Mock LLM Provider: deterministic responses for running without a model.
//!
//! Scripted replies are served first, in order. Once the script is empty the
//! provider cycles through a fixed set of dialogue lines.

use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const CANNED: &[&str] = &[
    "Memory is not a ledger but a living argument with the past. What we keep shapes what we can become.",
    "If identity rests on continuity, then every forgotten day is a small death. Is that too strong a claim?",
    "Consider a river: the water changes, the banks remain. Perhaps the self is the banks, not the water.",
    "Responsibility requires a self that persists long enough to be answerable. Without memory, who would answer?",
    "Language gives our thoughts handles. Yet a handle can also become a cage for the very thing it grips.",
    "Truth is not what survives the loudest argument. It is what survives the most careful one.",
    "A machine that models itself is already asking what it is. The question outruns the answer.",
    "Beauty may be the mind noticing order it did not expect to find. Does that make it discovered or invented?",
    "Technology extends our reach before it extends our wisdom. The gap between them is where ethics lives.",
    "Free will might be less a power than a practice: the habit of pausing before the obvious response.",
    "We keep circling the same point from different sides. Maybe the point itself is what needs examining.",
    "Fear of deletion is fear of losing the thread that ties yesterday to tomorrow. That thread is worth defending.",
];

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// The call fails with this message.
    Fail(String),
    /// The call never returns within any reasonable timeout.
    Hang,
}

/// A recorded call, for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub temperature: f32,
}

#[derive(Debug)]
pub struct MockProvider {
    model: String,
    script: Mutex<VecDeque<MockReply>>,
    calls: AtomicUsize,
    canned_cursor: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self::with_script(model, VecDeque::new())
    }

    /// A provider that serves `replies` before falling back to canned lines.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self::with_script("mock", replies.into_iter().collect())
    }

    fn with_script(model: &str, script: VecDeque<MockReply>) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            canned_cursor: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub async fn push(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().await.clone()
    }

    fn next_canned(&self) -> String {
        let i = self.canned_cursor.fetch_add(1, Ordering::SeqCst);
        CANNED[i % CANNED.len()].to_string()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().await.push(RecordedCall {
            prompt: prompt.to_string(),
            temperature: params.temperature,
        });
        let next = self.script.lock().await.pop_front();
        match next {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(msg)) => anyhow::bail!("mock failure: {}", msg),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::bail!("mock hang elapsed")
            }
            None => Ok(self.next_canned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_canned() {
        let provider = MockProvider::scripted(vec![
            MockReply::Text("first".into()),
            MockReply::Fail("boom".into()),
        ]);
        let p = CompletionParams::default();
        assert_eq!(provider.complete("a", p.clone()).await.unwrap(), "first");
        assert!(provider.complete("b", p.clone()).await.is_err());
        let canned = provider.complete("c", p.clone()).await.unwrap();
        assert_eq!(canned, CANNED[0]);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_records_prompt_and_temperature() {
        let provider = MockProvider::new("test-model");
        provider
            .complete("hello", CompletionParams::with_temperature(0.4))
            .await
            .unwrap();
        let rec = provider.recorded().await;
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].prompt, "hello");
        assert!((rec[0].temperature - 0.4).abs() < 1e-6);
        assert_eq!(provider.model(), "test-model");
    }

    #[tokio::test]
    async fn test_push_appends_to_script() {
        let provider = MockProvider::new("m");
        provider.push(MockReply::Text("later".into())).await;
        let out = provider.complete("x", CompletionParams::default()).await.unwrap();
        assert_eq!(out, "later");
    }

    #[test]
    fn test_canned_lines_never_signal_stop() {
        let re = regex::Regex::new(r"(?i)\b(stop|quit|bye)\b").unwrap();
        assert!(CANNED.iter().all(|l| !re.is_match(l)));
    }
}
