//! Dialogue quality metrics.
//!
//! - `circularity_rate`: fraction of turn pairs whose keyword sets overlap by
//!   at least the threshold
//! - `progress_rate`: forward steps per turn (topic shift, synthesis, or an
//!   answered question)
//! - `intervention_utility`: mean circularity drop around observer turns

use entelgia_core::text::{jaccard, keywords};
use entelgia_core::{DialogueTurn, TurnHistory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CIRCULARITY_THRESHOLD: f32 = 0.5;
const TOPIC_SHIFT_THRESHOLD: f32 = 0.4;
const UTILITY_WINDOW: usize = 5;

const SYNTHESIS_MARKERS: &[&str] = &[
    "therefore", "integrating", "combining", "synthesis", "synthesize", "connect", "connecting",
    "both", "together", "unified", "merging", "bridge", "converge", "overall",
];
const RESOLUTION_MARKERS: &[&str] = &[
    "answer", "resolve", "resolved", "solution", "because", "explains", "explained", "clarifies",
    "hence", "thus", "so",
];

fn signature(text: &str) -> BTreeSet<String> {
    keywords(text, 3)
}

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn circularity_of(turns: &[&DialogueTurn], threshold: f32) -> f32 {
    if turns.len() < 2 {
        return 0.0;
    }
    let sigs: Vec<_> = turns.iter().map(|t| signature(&t.text)).collect();
    let mut total = 0usize;
    let mut circular = 0usize;
    for i in 0..sigs.len() {
        for j in (i + 1)..sigs.len() {
            if sigs[i].is_empty() && sigs[j].is_empty() {
                continue;
            }
            total += 1;
            if jaccard(&sigs[i], &sigs[j]) >= threshold {
                circular += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        circular as f32 / total as f32
    }
}

pub fn circularity_rate(turns: &[DialogueTurn]) -> f32 {
    let refs: Vec<&DialogueTurn> = turns.iter().collect();
    circularity_of(&refs, CIRCULARITY_THRESHOLD)
}

/// Rolling circularity over the `window` turns ending at each turn.
pub fn circularity_per_turn(turns: &[DialogueTurn], window: usize) -> Vec<f32> {
    let window = window.max(1);
    (0..turns.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let refs: Vec<&DialogueTurn> = turns[start..=i].iter().collect();
            circularity_of(&refs, CIRCULARITY_THRESHOLD)
        })
        .collect()
}

pub fn progress_rate(turns: &[DialogueTurn]) -> f32 {
    if turns.len() < 2 {
        return 0.0;
    }
    let sigs: Vec<_> = turns.iter().map(|t| signature(&t.text)).collect();
    let mut steps = 0usize;
    for i in 1..turns.len() {
        let shifted = !(sigs[i - 1].is_empty() && sigs[i].is_empty())
            && jaccard(&sigs[i - 1], &sigs[i]) < TOPIC_SHIFT_THRESHOLD;
        let w = words(&turns[i].text);
        let synthesized = SYNTHESIS_MARKERS.iter().any(|m| w.contains(*m));
        let answered = turns[i - 1].text.contains('?')
            && RESOLUTION_MARKERS.iter().any(|m| w.contains(*m));
        if shifted || synthesized || answered {
            steps += 1;
        }
    }
    (steps as f32 / (turns.len() - 1) as f32).min(1.0)
}

/// Mean of (circularity before - circularity after) over observer turns.
/// Positive values mean interventions were followed by less looping.
pub fn intervention_utility(turns: &[DialogueTurn]) -> f32 {
    let mut reductions = Vec::new();
    for (idx, turn) in turns.iter().enumerate() {
        if !turn.is_observer() {
            continue;
        }
        let pre: Vec<&DialogueTurn> = turns[idx.saturating_sub(UTILITY_WINDOW)..idx].iter().collect();
        let post_end = (idx + 1 + UTILITY_WINDOW).min(turns.len());
        let post: Vec<&DialogueTurn> = turns[idx + 1..post_end].iter().collect();
        if pre.is_empty() || post.is_empty() {
            continue;
        }
        reductions.push(
            circularity_of(&pre, CIRCULARITY_THRESHOLD) - circularity_of(&post, CIRCULARITY_THRESHOLD),
        );
    }
    if reductions.is_empty() {
        0.0
    } else {
        reductions.iter().sum::<f32>() / reductions.len() as f32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueMetrics {
    pub circularity_rate: f32,
    pub progress_rate: f32,
    pub intervention_utility: f32,
}

impl DialogueMetrics {
    pub fn compute(history: &TurnHistory) -> Self {
        let turns = history.all();
        Self {
            circularity_rate: circularity_rate(turns),
            progress_rate: progress_rate(turns),
            intervention_utility: intervention_utility(turns),
        }
    }
}
