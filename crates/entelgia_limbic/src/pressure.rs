//! DrivePressure: a smoothed urgency scalar.
//!
//! Pressure rises with drive imbalance, open questions, topic stagnation and
//! (slightly) low energy. It never jumps: each update blends 35% of the new
//! target into the previous value, then clamps to [0, 10].
//!
//! Behavior is threshold-gated through [`PressureDirective`]:
//!
//! | pressure | effect |
//! |---|---|
//! | < 6.5 | none |
//! | >= 6.5 | ~120 word cap, one claim + one sharp question |
//! | >= 7.0, superego > ego | binary dilemmas become accept/resist/transcend |
//! | >= 8.0 | ~80 word cap, "stop framing, decide" |

use entelgia_core::state::{DriveVector, PRESSURE_MAX};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use std::sync::LazyLock;

const ALPHA: f32 = 0.35;
const CALM_DECAY: f32 = 0.4;
const MAX_OPEN_QUESTIONS: u32 = 5;
/// Same signature for this many turns counts as full stagnation.
const STAGNATION_RUN: usize = 4;
const SIGNATURE_KEYWORDS: usize = 5;

pub const FOCUS_THRESHOLD: f32 = 6.5;
pub const REFRAME_THRESHOLD: f32 = 7.0;
pub const DECIDE_THRESHOLD: f32 = 8.0;
pub const FOCUS_WORD_CAP: usize = 120;
pub const DECIDE_WORD_CAP: usize = 80;

static RE_RESOLVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^\s*\(?[AB12][).:]\s)|\b(i choose|i pick|i'd choose|i would choose|i decide|i side with|my answer is|the answer is|option [ab])\b",
    )
    .unwrap()
});

/// Inputs to one pressure update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureInputs {
    pub energy: f32,
    /// Raw drive imbalance `|id-ego| + |superego-ego|`.
    pub conflict: f32,
    pub unresolved: u32,
    /// 0 (fresh topic) to 1 (same topic for 4+ turns).
    pub stagnation: f32,
}

/// One smoothing step toward the pressure target.
pub fn compute_drive_pressure(prev: f32, inputs: PressureInputs) -> f32 {
    let conflict_n = (inputs.conflict / 10.0).clamp(0.0, 1.0);
    let unresolved_n = (inputs.unresolved as f32 / 3.0).min(1.0);
    let stagnation = inputs.stagnation.clamp(0.0, 1.0);
    let energy_low = (1.0 - inputs.energy / 100.0).clamp(0.0, 1.0);

    let raw = 0.45 * conflict_n + 0.25 * unresolved_n + 0.20 * stagnation + 0.10 * energy_low;
    let mut target = 10.0 * raw;
    if inputs.conflict < 4.0 && stagnation < 0.3 && inputs.unresolved == 0 {
        target -= CALM_DECAY;
    }

    let prev = if prev.is_finite() { prev } else { 0.0 };
    ((1.0 - ALPHA) * prev + ALPHA * target).clamp(0.0, PRESSURE_MAX)
}

/// Deterministic, order-independent signature of what a text is about.
///
/// Hashes the most frequent keywords (>= 4 letters, lowercase, sorted).
pub fn topic_signature(text: &str) -> String {
    let mut freq: BTreeMap<String, usize> = BTreeMap::new();
    for w in text.split(|c: char| !c.is_alphabetic()) {
        if w.chars().count() >= 4 {
            *freq.entry(w.to_lowercase()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let mut top: Vec<String> = ranked
        .into_iter()
        .take(SIGNATURE_KEYWORDS)
        .map(|(w, _)| w)
        .collect();
    top.sort();
    let digest = Sha256::digest(top.join(" ").as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Whether a reply commits to an answer instead of deferring.
pub fn is_question_resolved(text: &str) -> bool {
    RE_RESOLVED.is_match(text)
}

/// Open-question bookkeeping for one reply: an explicit answer closes one,
/// a new question opens one.
pub fn update_open_questions(open: u32, text: &str) -> u32 {
    let mut open = open;
    if is_question_resolved(text) {
        open = open.saturating_sub(1);
    }
    if text.contains('?') {
        open = (open + 1).min(MAX_OPEN_QUESTIONS);
    }
    open
}

/// Rolling window of topic signatures.
#[derive(Debug, Clone, Default)]
pub struct TopicTracker {
    recent: VecDeque<String>,
}

impl TopicTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-observer turn and return the resulting stagnation.
    pub fn observe(&mut self, text: &str) -> f32 {
        self.recent.push_back(topic_signature(text));
        while self.recent.len() > STAGNATION_RUN {
            self.recent.pop_front();
        }
        self.stagnation()
    }

    pub fn stagnation(&self) -> f32 {
        let Some(last) = self.recent.back() else {
            return 0.0;
        };
        let run = self.recent.iter().rev().take_while(|s| *s == last).count();
        if run >= STAGNATION_RUN {
            1.0
        } else {
            (run.saturating_sub(1)) as f32 / (STAGNATION_RUN - 1) as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    Calm,
    Focused,
    Decisive,
}

/// Output constraints implied by the current pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureDirective {
    pub level: PressureLevel,
    /// Rewrite binary dilemmas into a three-way choice.
    pub three_way: bool,
}

impl PressureDirective {
    pub fn evaluate(pressure: f32, drives: &DriveVector) -> Self {
        let level = if pressure >= DECIDE_THRESHOLD {
            PressureLevel::Decisive
        } else if pressure >= FOCUS_THRESHOLD {
            PressureLevel::Focused
        } else {
            PressureLevel::Calm
        };
        let three_way = pressure >= REFRAME_THRESHOLD && drives.superego > drives.ego;
        Self { level, three_way }
    }

    pub fn word_cap(&self) -> Option<usize> {
        match self.level {
            PressureLevel::Calm => None,
            PressureLevel::Focused => Some(FOCUS_WORD_CAP),
            PressureLevel::Decisive => Some(DECIDE_WORD_CAP),
        }
    }

    /// Extra prompt instructions, empty when calm.
    pub fn prompt_lines(&self) -> Vec<&'static str> {
        let mut lines = Vec::new();
        match self.level {
            PressureLevel::Calm => {}
            PressureLevel::Focused => {
                lines.push("Be brief: make ONE claim and ask ONE sharp question.");
            }
            PressureLevel::Decisive => {
                lines.push("Stop framing. Decide. State your position in under 80 words.");
            }
        }
        if self.three_way {
            lines.push("Do not pose either/or dilemmas; offer three paths: accept, resist, or transcend.");
        }
        lines
    }
}
