use thiserror::Error;

/// Why a turn did not complete.
///
/// A completion failure leaves agent state and memory exactly as they were
/// before the turn started. A store error raised before the turn's memory
/// write does too; one raised afterwards (dream, slip, replication) leaves
/// the turn recorded in history and memory, with drives and energy updated.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("turn failed: completion for {agent} failed after {attempts} attempts (retry later): {source:#}")]
    CompletionFailed {
        agent: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The session cannot continue. See the type docs for what was kept.
    #[error("turn failed: memory store error (aborting): {0:#}")]
    Store(#[source] anyhow::Error),
}

impl TurnError {
    /// Whether the caller may simply try the turn again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TurnError::CompletionFailed { .. })
    }
}
