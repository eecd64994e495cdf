//! Dialogue turns and the append-only session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rhetorical instruction template rotated to diversify turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    AgreeAndExpand,
    QuestionAssumption,
    ConstructiveDisagree,
    ExploreImplication,
    IntroduceAnalogy,
    MetaReflect,
    Synthesize,
}

impl SeedStrategy {
    /// Rotation order of the palette.
    pub const PALETTE: [SeedStrategy; 7] = [
        SeedStrategy::AgreeAndExpand,
        SeedStrategy::QuestionAssumption,
        SeedStrategy::ConstructiveDisagree,
        SeedStrategy::ExploreImplication,
        SeedStrategy::IntroduceAnalogy,
        SeedStrategy::MetaReflect,
        SeedStrategy::Synthesize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStrategy::AgreeAndExpand => "agree_and_expand",
            SeedStrategy::QuestionAssumption => "question_assumption",
            SeedStrategy::ConstructiveDisagree => "constructive_disagree",
            SeedStrategy::ExploreImplication => "explore_implication",
            SeedStrategy::IntroduceAnalogy => "introduce_analogy",
            SeedStrategy::MetaReflect => "meta_reflect",
            SeedStrategy::Synthesize => "synthesize",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            SeedStrategy::AgreeAndExpand => {
                "BUILD on the previous insight. Add a new dimension or implication."
            }
            SeedStrategy::QuestionAssumption => {
                "QUESTION a hidden assumption in what was just said."
            }
            SeedStrategy::ConstructiveDisagree => {
                "DISAGREE constructively. Offer a well-reasoned counterpoint."
            }
            SeedStrategy::ExploreImplication => {
                "EXPLORE consequences. If this is true, what follows?"
            }
            SeedStrategy::IntroduceAnalogy => {
                "CONNECT via analogy. Bring in an example from another domain."
            }
            SeedStrategy::MetaReflect => {
                "REFLECT on our dialogue. What are we learning? Where are we stuck?"
            }
            SeedStrategy::Synthesize => "INTEGRATE the perspectives so far into a coherent view.",
        }
    }

    pub fn render(&self, topic: &str) -> String {
        format!("TOPIC: {}\n{}", topic, self.instruction())
    }

    /// The palette entry after this one, wrapping around.
    pub fn next(&self) -> SeedStrategy {
        let idx = Self::PALETTE.iter().position(|s| s == self).unwrap_or(0);
        Self::PALETTE[(idx + 1) % Self::PALETTE.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Agent,
    Observer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// 1-based position in the session.
    pub index: u32,
    pub speaker: String,
    pub role: TurnRole,
    pub text: String,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub seed_strategy: Option<SeedStrategy>,
}

impl DialogueTurn {
    pub fn is_observer(&self) -> bool {
        self.role == TurnRole::Observer
    }
}

/// Append-only turn sequence owned by a session.
///
/// Turns are never mutated after `push`; readers only take windows from the
/// tail, so backward scans stay O(k) in the window size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnHistory {
    turns: Vec<DialogueTurn>,
}

impl TurnHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: DialogueTurn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&DialogueTurn> {
        self.turns.last()
    }

    pub fn all(&self) -> &[DialogueTurn] {
        &self.turns
    }

    /// The last `k` turns, oldest first.
    pub fn tail(&self, k: usize) -> &[DialogueTurn] {
        let start = self.turns.len().saturating_sub(k);
        &self.turns[start..]
    }

    /// The last `k` non-observer turns, oldest first.
    pub fn agent_tail(&self, k: usize) -> Vec<&DialogueTurn> {
        let mut out: Vec<&DialogueTurn> = self
            .turns
            .iter()
            .rev()
            .filter(|t| !t.is_observer())
            .take(k)
            .collect();
        out.reverse();
        out
    }

    /// Most recent non-observer turn, skipping observer interventions.
    pub fn last_agent_turn(&self) -> Option<&DialogueTurn> {
        self.turns.iter().rev().find(|t| !t.is_observer())
    }

    /// How many of the most recent non-observer turns belong to the same speaker.
    pub fn consecutive_run(&self) -> (Option<&str>, usize) {
        let mut agents = self.turns.iter().rev().filter(|t| !t.is_observer());
        let Some(first) = agents.next() else {
            return (None, 0);
        };
        let run = 1 + agents.take_while(|t| t.speaker == first.speaker).count();
        (Some(first.speaker.as_str()), run)
    }

    /// Number of turns by `speaker` among the last `window` non-observer turns.
    pub fn participation(&self, speaker: &str, window: usize) -> usize {
        self.agent_tail(window)
            .iter()
            .filter(|t| t.speaker == speaker)
            .count()
    }
}
