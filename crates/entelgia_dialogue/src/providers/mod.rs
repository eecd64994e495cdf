pub mod mock;
pub mod ollama;

pub use mock::{MockProvider, MockReply, RecordedCall};
pub use ollama::OllamaClient;
