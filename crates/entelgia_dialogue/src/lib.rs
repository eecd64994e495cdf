//! # Entelgia Dialogue
//!
//! Turn orchestration on top of the limbic and memory crates:
//!
//! - **Completion**: the `LlmClient` seam, retry with backoff, Ollama and mock providers
//! - **Orchestration**: speaker policies, seed selection, prompt assembly, post-processing
//! - **Observer**: need-based interventions and dialogue metrics
//! - **Session**: the sequential turn loop that ties it all together

pub mod context;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod observer;
pub mod postprocess;
pub mod providers;
pub mod retry;
pub mod seeds;
pub mod session;
pub mod speaker;
pub mod topics;

pub use context::{ContextAssembler, PromptInputs};
pub use error::TurnError;
pub use llm::{complete_with_retry, CompletionParams, LlmClient};
pub use metrics::DialogueMetrics;
pub use observer::{InterventionKind, Observer, FALLBACK_INTERVENTION};
pub use postprocess::{postprocess, BehaviorRule, PostContext};
pub use providers::{MockProvider, MockReply, OllamaClient};
pub use retry::{with_retry, PermanentError, RetryConfig};
pub use session::{Agent, Session, SessionSummary, TurnEvent, TurnOutcome};
pub use speaker::{policy_for, DynamicSelection, SimpleAlternation, SpeakerPolicy};
pub use topics::TopicCursor;
