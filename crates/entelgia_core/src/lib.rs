//! # Entelgia Core
//!
//! Shared vocabulary of the regulation engine: configuration, agent drive
//! state, the persona interface, the append-only turn history, and the
//! signature layer that authenticates long-term memories.

pub mod config;
pub mod dialogue;
pub mod emotion;
pub mod error;
pub mod persona;
pub mod signature;
pub mod state;
pub mod text;

pub use config::{
    DialogueConfig, DialogueMode, EnergyConfig, EntelgiaConfig, LlmConfig, MemoryConfig,
    PromotionMode, SurfacingConfig,
};
pub use dialogue::{DialogueTurn, SeedStrategy, TurnHistory, TurnRole};
pub use emotion::tag_emotion;
pub use error::{ConfigError, SignatureError};
pub use persona::{Persona, RichPersona, StaticPersona};
pub use signature::{SignedPayload, SigningKey};
pub use state::{AgentState, DebateProfile, DebateStyle, Drive, DriveVector};
