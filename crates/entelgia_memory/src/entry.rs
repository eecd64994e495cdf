//! Memory entry schema shared by both strata.

use chrono::{SecondsFormat, Utc};
use entelgia_core::SignedPayload;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Max characters kept for a short-term entry.
pub const STM_TEXT_MAX: usize = 300;

const IMPORTANT_WORDS: &[&str] = &[
    "important",
    "critical",
    "key",
    "essential",
    "fundamental",
    "breakthrough",
];
const INTENSE_MARKERS: &[&str] = &["!", "?", "...", "deeply", "profoundly"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLayer {
    ShortTerm,
    Conscious,
    Subconscious,
}

impl MemoryLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLayer::ShortTerm => "short_term",
            MemoryLayer::Conscious => "conscious",
            MemoryLayer::Subconscious => "subconscious",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "short_term" => Some(MemoryLayer::ShortTerm),
            "conscious" => Some(MemoryLayer::Conscious),
            "subconscious" => Some(MemoryLayer::Subconscious),
            _ => None,
        }
    }
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    Direct,
    DreamPromotion,
    FreudianSlip,
    SelfReplication,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::Direct => "direct",
            MemorySource::DreamPromotion => "dream_promotion",
            MemorySource::FreudianSlip => "freudian_slip",
            MemorySource::SelfReplication => "self_replication",
        }
    }

    /// Unknown labels read back as `Direct`.
    pub fn parse(s: &str) -> Self {
        match s {
            "dream_promotion" => MemorySource::DreamPromotion,
            "freudian_slip" => MemorySource::FreudianSlip,
            "self_replication" => MemorySource::SelfReplication,
            _ => MemorySource::Direct,
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-width RFC 3339 UTC timestamp; sorts lexicographically.
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One short-term buffer record. Volatile and unsigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmEntry {
    pub ts: String,
    pub text: String,
    pub topic: String,
    pub emotion: String,
    pub emotion_intensity: f32,
    pub importance: f32,
    #[serde(default = "default_source")]
    pub source: MemorySource,
    #[serde(default)]
    pub sensitive: bool,
}

fn default_source() -> MemorySource {
    MemorySource::Direct
}

impl StmEntry {
    pub fn new(text: &str, topic: &str, emotion: &str, emotion_intensity: f32) -> Self {
        let text: String = text.trim().chars().take(STM_TEXT_MAX).collect();
        let importance = importance_score(&text);
        Self {
            ts: now_ts(),
            text,
            topic: topic.to_string(),
            emotion: emotion.to_string(),
            emotion_intensity: emotion_intensity.clamp(0.0, 1.0),
            importance,
            source: MemorySource::Direct,
            sensitive: false,
        }
    }
}

/// One long-term row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub agent: String,
    pub layer: MemoryLayer,
    pub content: String,
    pub topic: String,
    pub emotion: String,
    pub emotion_intensity: f32,
    pub importance: f32,
    pub source: MemorySource,
    /// Id of the entry this one was copied from, for promotions.
    pub promoted_from: Option<String>,
    pub intrusive: bool,
    pub suppressed: bool,
    pub ts: String,
}

impl MemoryEntry {
    pub fn new(agent: &str, layer: MemoryLayer, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent: agent.to_string(),
            layer,
            content: content.to_string(),
            topic: String::new(),
            emotion: "neutral".to_string(),
            emotion_intensity: 0.0,
            importance: importance_score(content),
            source: MemorySource::Direct,
            promoted_from: None,
            intrusive: false,
            suppressed: false,
            ts: now_ts(),
        }
    }

    pub fn with_topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_string();
        self
    }

    pub fn with_emotion(mut self, emotion: &str, intensity: f32) -> Self {
        self.emotion = emotion.to_string();
        self.emotion_intensity = intensity.clamp(0.0, 1.0);
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// A fresh conscious-layer copy of this entry, tagged with `source`.
    pub fn promoted_copy(&self, source: MemorySource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            layer: MemoryLayer::Conscious,
            source,
            promoted_from: Some(self.id.clone()),
            ts: now_ts(),
            ..self.clone()
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.intrusive || self.suppressed
    }

    /// The signed subset of this entry.
    pub fn payload(&self) -> SignedPayload<'_> {
        SignedPayload::new(&self.content, &self.emotion, &self.topic, &self.ts)
    }
}

/// Heuristic importance in [0.2, 1.0]; no model call.
pub fn importance_score(text: &str) -> f32 {
    if text.is_empty() {
        return 0.2;
    }
    let mut score = 0.3 + (text.chars().count() as f32 / 1000.0).min(0.2);
    let lower = text.to_lowercase();
    if IMPORTANT_WORDS.iter().any(|w| lower.contains(w)) {
        score += 0.2;
    }
    if INTENSE_MARKERS.iter().any(|m| text.contains(m)) {
        score += 0.1;
    }
    score.min(1.0)
}
