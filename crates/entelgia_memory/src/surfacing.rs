//! Retrieval surfacing: Freudian slips and self-replication.
//!
//! Both policies only ever pull existing entries forward. A slip with no
//! flagged candidate is `None`, never a fabricated memory.

use crate::entry::{MemoryEntry, MemoryLayer, MemorySource};
use crate::sqlite::LongTermStore;
use anyhow::Result;
use entelgia_core::text::keywords;
use entelgia_core::SurfacingConfig;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::HashMap;

/// Replication keywords are at least this many letters long.
const KEYWORD_MIN_LEN: usize = 4;
const KEYWORD_MIN_ENTRIES: usize = 2;

#[derive(Debug, Clone)]
pub struct FreudianSlip {
    probability: f64,
    window: usize,
}

impl FreudianSlip {
    pub fn new(probability: f32, window: usize) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0) as f64,
            window,
        }
    }

    pub fn from_config(cfg: &SurfacingConfig) -> Self {
        Self::new(cfg.slip_probability, cfg.slip_window)
    }

    /// Pick one defended entry, weighted by how many flags it carries.
    ///
    /// The probability roll happens only when a candidate exists.
    pub fn attempt<R: Rng + ?Sized>(&self, recent: &[MemoryEntry], rng: &mut R) -> Option<MemoryEntry> {
        let candidates: Vec<&MemoryEntry> = recent
            .iter()
            .take(self.window)
            .filter(|m| m.is_flagged())
            .collect();
        if candidates.is_empty() {
            return None;
        }
        if !rng.gen_bool(self.probability) {
            return None;
        }
        let weights = candidates
            .iter()
            .map(|m| m.intrusive as u32 + m.suppressed as u32);
        let dist = WeightedIndex::new(weights).ok()?;
        let chosen = candidates[dist.sample(rng)];
        let mut slipped = chosen.clone();
        slipped.source = MemorySource::FreudianSlip;
        Some(slipped)
    }

    /// Roll a slip for `agent` and promote the survivor. Returns the promoted copy.
    pub async fn surface<R: Rng + ?Sized>(
        &self,
        store: &LongTermStore,
        agent: &str,
        rng: &mut R,
    ) -> Result<Option<MemoryEntry>> {
        let recent = store.flagged_recent(agent, self.window).await?;
        let Some(slipped) = self.attempt(&recent, rng) else {
            return Ok(None);
        };
        let promoted = store.promote(&slipped, MemorySource::FreudianSlip).await?;
        if let Some(p) = &promoted {
            tracing::info!("[SLIP] {}: {}", agent, p.content);
        }
        Ok(promoted)
    }
}

#[derive(Debug, Clone)]
pub struct SelfReplication {
    every_n_turns: u32,
    window: usize,
    max_promoted: usize,
}

impl SelfReplication {
    pub fn new(every_n_turns: u32, window: usize, max_promoted: usize) -> Self {
        Self {
            every_n_turns: every_n_turns.max(1),
            window,
            max_promoted,
        }
    }

    pub fn from_config(cfg: &SurfacingConfig) -> Self {
        Self::new(cfg.replicate_every_n_turns, cfg.replicate_window, cfg.replicate_max)
    }

    pub fn is_due(&self, turn: u32) -> bool {
        turn > 0 && turn % self.every_n_turns == 0
    }

    /// Entries sharing a recurring keyword, highest importance first.
    pub fn select(&self, recent: &[MemoryEntry]) -> Vec<MemoryEntry> {
        let window: Vec<&MemoryEntry> = recent.iter().take(self.window).collect();
        let per_entry: Vec<_> = window
            .iter()
            .map(|m| keywords(&m.content, KEYWORD_MIN_LEN - 1))
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for kws in &per_entry {
            for kw in kws {
                *counts.entry(kw.as_str()).or_default() += 1;
            }
        }

        let mut matched: Vec<&MemoryEntry> = window
            .iter()
            .zip(&per_entry)
            .filter(|(_, kws)| {
                kws.iter()
                    .any(|k| counts.get(k.as_str()).copied().unwrap_or(0) >= KEYWORD_MIN_ENTRIES)
            })
            .map(|(m, _)| *m)
            .collect();
        matched.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        matched
            .into_iter()
            .take(self.max_promoted)
            .map(|m| {
                let mut copy = m.clone();
                copy.source = MemorySource::SelfReplication;
                copy
            })
            .collect()
    }

    /// Promote recurring-pattern entries for `agent`. Returns what was written.
    pub async fn replicate(&self, store: &LongTermStore, agent: &str) -> Result<Vec<MemoryEntry>> {
        let recent = store
            .recent(agent, self.window, Some(MemoryLayer::Subconscious))
            .await?;
        let mut promoted = Vec::new();
        for entry in self.select(&recent) {
            if let Some(p) = store.promote(&entry, MemorySource::SelfReplication).await? {
                tracing::info!("[SELF-REPL] {}: {}", agent, p.content);
                promoted.push(p);
            }
        }
        Ok(promoted)
    }
}
