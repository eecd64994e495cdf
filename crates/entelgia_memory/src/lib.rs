//! # Entelgia Memory
//!
//! Two strata per agent:
//!
//! - **Short-term**: bounded, volatile, unsigned; one JSON snapshot per agent
//! - **Long-term**: SQLite, signed on write, filtered on read, split into a
//!   conscious and a subconscious layer
//!
//! On top of the store sit the defense classifier, slip and replication
//! surfacing, and the dream cycle that moves material between layers.

pub mod defense;
pub mod dream;
pub mod entry;
pub mod privacy;
pub mod short_term;
pub mod sqlite;
pub mod surfacing;

pub use defense::{classify, DefenseFlags};
pub use dream::{DreamCycle, DreamReport, PromotionGate};
pub use entry::{importance_score, MemoryEntry, MemoryLayer, MemorySource, StmEntry};
pub use privacy::{is_sensitive, redact_pii, sensitive_summary};
pub use short_term::ShortTermMemory;
pub use sqlite::LongTermStore;
pub use surfacing::{FreudianSlip, SelfReplication};
