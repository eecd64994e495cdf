//! Dream cycle: consolidates short-term into long-term memory and recharges
//! energy.
//!
//! A cycle runs two passes over the agent's memory:
//! 1. **Integration**: recent STM entries that clear the promotion gate, plus
//!    subconscious entries relevant to the current topic, are copied into the
//!    conscious layer. Existing long-term rows are never deleted.
//! 2. **Forgetting**: STM entries that are empty, whitespace-only, or carry no
//!    keyword at all are dropped.
//!
//! A full cycle then persists the STM snapshot and sets energy to 100. The
//! periodic variant runs the same passes without touching energy.

use crate::entry::{MemoryEntry, MemoryLayer, MemorySource, StmEntry};
use crate::short_term::ShortTermMemory;
use crate::sqlite::LongTermStore;
use anyhow::Result;
use entelgia_core::state::{AgentState, ENERGY_MAX};
use entelgia_core::text::keywords;
use entelgia_core::{MemoryConfig, PromotionMode};
use serde::{Deserialize, Serialize};

/// STM entries considered for promotion.
const PROMOTION_WINDOW: usize = 40;
/// Subconscious entries integrated per cycle.
const SUBCONSCIOUS_PER_CYCLE: usize = 3;
/// Topic hits a subconscious entry needs to be integrated.
const SUBCONSCIOUS_MIN_TOPIC_HITS: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DreamReport {
    pub promoted: usize,
    pub forgotten: usize,
    pub energy_before: f32,
}

/// Importance/intensity gate for STM -> conscious promotion.
#[derive(Debug, Clone, Copy)]
pub struct PromotionGate {
    pub importance: f32,
    pub emotion: f32,
    pub mode: PromotionMode,
}

impl PromotionGate {
    pub fn from_config(cfg: &MemoryConfig) -> Self {
        Self {
            importance: cfg.promote_importance_threshold,
            emotion: cfg.promote_emotion_threshold,
            mode: cfg.promotion_mode,
        }
    }

    pub fn passes(&self, importance: f32, intensity: f32) -> bool {
        let imp = importance >= self.importance;
        let emo = intensity >= self.emotion;
        match self.mode {
            PromotionMode::Either => imp || emo,
            PromotionMode::Both => imp && emo,
        }
    }
}

/// Whether a short-term entry is worth keeping.
pub fn is_forgettable(entry: &StmEntry) -> bool {
    let text = entry.text.trim();
    text.is_empty() || keywords(text, 2).is_empty()
}

#[derive(Debug, Clone)]
pub struct DreamCycle {
    gate: PromotionGate,
}

impl DreamCycle {
    pub fn new(gate: PromotionGate) -> Self {
        Self { gate }
    }

    pub fn from_config(cfg: &MemoryConfig) -> Self {
        Self::new(PromotionGate::from_config(cfg))
    }

    /// Full cycle, triggered by the regulator. Energy ends at exactly 100.
    pub async fn run(
        &self,
        agent: &str,
        stm: &mut ShortTermMemory,
        store: &LongTermStore,
        state: &mut AgentState,
        topic: &str,
        dialogue: &str,
    ) -> Result<DreamReport> {
        let energy_before = state.energy;
        let mut report = self.consolidate(agent, stm, store, topic, dialogue).await?;
        report.energy_before = energy_before;
        state.energy = ENERGY_MAX;
        tracing::info!(
            "[DREAM] {}: promoted={} forgotten={} energy {:.1} -> {:.1}",
            agent,
            report.promoted,
            report.forgotten,
            energy_before,
            state.energy
        );
        Ok(report)
    }

    /// Integration and forgetting without recharge.
    pub async fn consolidate(
        &self,
        agent: &str,
        stm: &mut ShortTermMemory,
        store: &LongTermStore,
        topic: &str,
        dialogue: &str,
    ) -> Result<DreamReport> {
        let mut promoted = 0;

        let batch: Vec<StmEntry> = stm
            .tail(PROMOTION_WINDOW)
            .into_iter()
            .filter(|e| !is_forgettable(e))
            .filter(|e| self.gate.passes(e.importance, e.emotion_intensity))
            .cloned()
            .collect();
        for e in batch {
            let mut entry = MemoryEntry::new(agent, MemoryLayer::Conscious, e.text.trim())
                .with_topic(&e.topic)
                .with_emotion(&e.emotion, e.emotion_intensity)
                .with_importance(e.importance);
            entry.source = MemorySource::DreamPromotion;
            if store.insert_conscious_dedup(&entry).await? {
                promoted += 1;
            }
        }

        let topic_kw = keywords(topic, 3);
        let subconscious = store
            .relevant(agent, Some(MemoryLayer::Subconscious), topic, dialogue, SUBCONSCIOUS_PER_CYCLE)
            .await?;
        for entry in subconscious {
            let hits = keywords(&entry.content, 3).intersection(&topic_kw).count()
                + usize::from(entry.topic == topic);
            if hits < SUBCONSCIOUS_MIN_TOPIC_HITS {
                continue;
            }
            if store.promote(&entry, MemorySource::DreamPromotion).await?.is_some() {
                promoted += 1;
            }
        }

        let forgotten = stm.retain(|e| !is_forgettable(e));
        stm.flush()?;

        Ok(DreamReport {
            promoted,
            forgotten,
            energy_before: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_modes() {
        let either = PromotionGate {
            importance: 0.72,
            emotion: 0.65,
            mode: PromotionMode::Either,
        };
        assert!(either.passes(0.8, 0.1));
        assert!(either.passes(0.1, 0.7));
        assert!(!either.passes(0.5, 0.5));

        let both = PromotionGate {
            mode: PromotionMode::Both,
            ..either
        };
        assert!(!both.passes(0.8, 0.1));
        assert!(both.passes(0.72, 0.65));
    }

    #[test]
    fn test_forgettable() {
        assert!(is_forgettable(&StmEntry::new("", "t", "neutral", 0.1)));
        assert!(is_forgettable(&StmEntry::new("  \n ", "t", "neutral", 0.1)));
        assert!(is_forgettable(&StmEntry::new("?! ... 42", "t", "neutral", 0.1)));
        assert!(!is_forgettable(&StmEntry::new("Truth matters.", "t", "neutral", 0.1)));
    }
}
