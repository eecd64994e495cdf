//! Intervention observer.
//!
//! Checks run on need, not on a schedule: each completed agent turn the
//! observer scans the recent window for a handful of unproductive patterns
//! and, if one fires, produces a single short corrective turn. Observer turns
//! never touch agent drives or memory.

use crate::llm::{complete_with_retry, CompletionParams, LlmClient};
use crate::postprocess::{remove_forbidden_phrases, sanitize, strip_headers};
use crate::retry::RetryConfig;
use entelgia_core::text::{jaccard, keywords, trim_to_word_limit, truncate_at_word};
use entelgia_core::{Persona, RichPersona, TurnHistory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const FALLBACK_INTERVENTION: &str = "I notice we might benefit from a fresh perspective here.";
pub const OBSERVER_TEMPERATURE: f32 = 0.4;

const WINDOW: usize = 10;
const PROMPT_TURNS: usize = 6;
const PROMPT_LINE_CHARS: usize = 200;
const MAX_INTERVENTION_WORDS: usize = 90;

const CONFLICT_MARKERS: &[&str] = &[
    "disagree", "however", "wrong", "incorrect", "actually", "contrary", "opposite",
];
const DEPTH_MARKERS: &[&str] = &[
    "why", "because", "therefore", "implies", "consequence", "deeper", "fundamental", "underlying",
];
const SYNTHESIS_MARKERS: &[&str] = &["connect", "integrate", "together", "both", "combine"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    CircularReasoning,
    HighConflict,
    ShallowDiscussion,
    TopicDrift,
    PersonaCollapse,
    SynthesisOpportunity,
    MetaReflection,
}

impl InterventionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionKind::CircularReasoning => "circular_reasoning",
            InterventionKind::HighConflict => "high_conflict_no_resolution",
            InterventionKind::ShallowDiscussion => "shallow_discussion",
            InterventionKind::TopicDrift => "topic_drift",
            InterventionKind::PersonaCollapse => "persona_collapse",
            InterventionKind::SynthesisOpportunity => "synthesis_opportunity",
            InterventionKind::MetaReflection => "meta_reflection_needed",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            InterventionKind::CircularReasoning => {
                "The dialogue keeps returning to the same points. Name the loop you see, \
                 then offer one specific reframe that breaks it."
            }
            InterventionKind::HighConflict => {
                "The speakers keep contradicting each other without moving. Acknowledge the \
                 tension, point to what the positions share, and suggest one bridge."
            }
            InterventionKind::ShallowDiscussion => {
                "The exchange has stayed on the surface. Say so, and pose one deeper \
                 question about causes or consequences."
            }
            InterventionKind::TopicDrift => {
                "The dialogue has wandered away from its topic. Point out the drift and \
                 pull it back with one concrete question on the topic."
            }
            InterventionKind::PersonaCollapse => {
                "The two speakers now sound the same. Remind each of their own angle and \
                 ask one question only one of them would ask."
            }
            InterventionKind::SynthesisOpportunity => {
                "Complementary ideas are sitting side by side unconnected. Point them out \
                 and suggest how they might combine."
            }
            InterventionKind::MetaReflection => {
                "Step back. Say what the dialogue has established so far, which pattern \
                 keeps recurring, and where it should go next."
            }
        }
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

fn fraction_with(texts: &[&str], markers: &[&str]) -> f32 {
    if texts.is_empty() {
        return 0.0;
    }
    let hits = texts.iter().filter(|t| contains_any(t, markers)).count();
    hits as f32 / texts.len() as f32
}

fn is_circular(texts: &[&str]) -> bool {
    if texts.len() < 4 {
        return false;
    }
    let sets: Vec<_> = texts.iter().map(|t| keywords(t, 4)).collect();
    let mut pairs = 0;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            if jaccard(&sets[i], &sets[j]) > 0.5 {
                pairs += 1;
            }
        }
    }
    pairs >= 3
}

fn is_high_conflict(texts: &[&str]) -> bool {
    texts.len() >= 4 && fraction_with(texts, CONFLICT_MARKERS) > 0.6
}

fn is_shallow(texts: &[&str]) -> bool {
    if texts.len() < 6 {
        return false;
    }
    let avg_len = texts.iter().map(|t| t.chars().count()).sum::<usize>() as f32 / texts.len() as f32;
    avg_len < 150.0 && fraction_with(texts, DEPTH_MARKERS) < 0.3
}

fn has_drifted(texts: &[&str], topic: &str) -> bool {
    let topic_kw = keywords(topic, 3);
    if texts.len() < 3 || topic_kw.is_empty() {
        return false;
    }
    texts[texts.len() - 3..]
        .iter()
        .all(|t| keywords(t, 3).is_disjoint(&topic_kw))
}

fn has_collapsed(texts: &[&str]) -> bool {
    match texts {
        [.., a, b] => jaccard(&keywords(a, 3), &keywords(b, 3)) > 0.7,
        _ => false,
    }
}

fn lacks_synthesis(texts: &[&str]) -> bool {
    texts.len() >= 5
        && !texts[texts.len() - 3..]
            .iter()
            .any(|t| contains_any(t, SYNTHESIS_MARKERS))
}

/// The meta-cognitive observer.
pub struct Observer {
    persona: RichPersona,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    pub fn new() -> Self {
        Self {
            persona: RichPersona::fixy(),
        }
    }

    pub fn name(&self) -> &str {
        self.persona.name()
    }

    /// Decide whether to intervene after agent turn `turn` (1-based).
    pub fn detect(&self, history: &TurnHistory, turn: u32, topic: &str) -> Option<InterventionKind> {
        if turn < 3 {
            return None;
        }
        // Never on consecutive turns, and never right after an intervention
        // that preceded the latest agent turn.
        let tail = history.tail(2);
        if tail.iter().any(|t| t.is_observer()) {
            return None;
        }

        let window = history.agent_tail(WINDOW);
        let texts: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();

        let kind = if is_circular(&texts) {
            InterventionKind::CircularReasoning
        } else if turn >= 6 && is_high_conflict(&texts) {
            InterventionKind::HighConflict
        } else if turn >= 10 && is_shallow(&texts) {
            InterventionKind::ShallowDiscussion
        } else if has_drifted(&texts, topic) {
            InterventionKind::TopicDrift
        } else if has_collapsed(&texts) {
            InterventionKind::PersonaCollapse
        } else if turn >= 5 && lacks_synthesis(&texts) {
            InterventionKind::SynthesisOpportunity
        } else if turn > 15 && turn % 15 == 0 {
            InterventionKind::MetaReflection
        } else {
            return None;
        };
        tracing::debug!("Observer flagged {} at turn {}", kind.as_str(), turn);
        Some(kind)
    }

    pub fn intervention_prompt(&self, kind: InterventionKind, history: &TurnHistory, topic: &str) -> String {
        let recent = history
            .tail(PROMPT_TURNS)
            .iter()
            .map(|t| format!("{}: {}", t.speaker, truncate_at_word(&t.text, PROMPT_LINE_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are {}, the meta-cognitive observer. {}\n{}\nStay on the current topic: {}.\n\n\
             RECENT DIALOGUE:\n{}\n\n\
             Generate your intervention (2-4 sentences, direct and concrete):",
            self.persona.name(),
            self.persona.description,
            kind.instruction(),
            topic,
            recent
        )
    }

    /// Produce the intervention text. Never fails: a completion error or an
    /// empty reply yields the fallback line.
    pub async fn intervene(
        &self,
        client: &Arc<dyn LlmClient>,
        retry: &RetryConfig,
        kind: InterventionKind,
        history: &TurnHistory,
        topic: &str,
    ) -> String {
        let prompt = self.intervention_prompt(kind, history, topic);
        let params = CompletionParams::with_temperature(OBSERVER_TEMPERATURE);
        match complete_with_retry(client, retry, "observer", &prompt, params).await {
            Ok(raw) => {
                let text = strip_headers(&sanitize(&raw), self.persona.name());
                let text = trim_to_word_limit(&remove_forbidden_phrases(&text), MAX_INTERVENTION_WORDS);
                if text.is_empty() {
                    FALLBACK_INTERVENTION.to_string()
                } else {
                    text
                }
            }
            Err(e) => {
                tracing::warn!("Observer completion failed, using fallback: {:#}", e);
                FALLBACK_INTERVENTION.to_string()
            }
        }
    }
}
