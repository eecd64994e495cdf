//! Speaker selection strategies.
//!
//! Both strategies read the turn history backwards past observer turns, so an
//! intervention never counts as anyone's turn. Neither lets an agent take a
//! third consecutive non-observer turn.

use entelgia_core::{DialogueMode, TurnHistory};
use rand::rngs::StdRng;
use rand::Rng;

/// An agent may hold at most this many consecutive non-observer turns.
pub const MAX_CONSECUTIVE_TURNS: usize = 2;
const PARTICIPATION_WINDOW: usize = 10;
const STAGNATION_SWITCH: f32 = 0.66;
const STAGNATION_BONUS: f32 = 2.0;

/// What a policy knows about each agent.
#[derive(Debug, Clone, Copy)]
pub struct SpeakerCandidate<'a> {
    pub name: &'a str,
    /// Raw drive imbalance of the agent.
    pub imbalance: f32,
}

pub trait SpeakerPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index into `candidates` of the next speaker. `candidates[0]` is the opener.
    fn choose(
        &self,
        candidates: &[SpeakerCandidate<'_>],
        history: &TurnHistory,
        stagnation: f32,
        rng: &mut StdRng,
    ) -> usize;
}

pub fn policy_for(mode: DialogueMode) -> Box<dyn SpeakerPolicy> {
    match mode {
        DialogueMode::Simple => Box::new(SimpleAlternation),
        DialogueMode::Dynamic => Box::new(DynamicSelection),
    }
}

/// Candidates allowed to speak next. Falls back to everyone if the
/// constraint would leave nobody.
fn eligible(candidates: &[SpeakerCandidate<'_>], history: &TurnHistory) -> Vec<usize> {
    let (last, run) = history.consecutive_run();
    let blocked = if run >= MAX_CONSECUTIVE_TURNS { last } else { None };
    let allowed: Vec<usize> = (0..candidates.len())
        .filter(|&i| Some(candidates[i].name) != blocked)
        .collect();
    if allowed.is_empty() {
        (0..candidates.len()).collect()
    } else {
        allowed
    }
}

/// Round-robin by the last non-observer speaker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleAlternation;

impl SpeakerPolicy for SimpleAlternation {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn choose(
        &self,
        candidates: &[SpeakerCandidate<'_>],
        history: &TurnHistory,
        _stagnation: f32,
        _rng: &mut StdRng,
    ) -> usize {
        if candidates.is_empty() {
            return 0;
        }
        let Some(last) = history.last_agent_turn() else {
            return 0;
        };
        let next = candidates
            .iter()
            .position(|c| c.name == last.speaker)
            .map_or(0, |pos| (pos + 1) % candidates.len());
        let allowed = eligible(candidates, history);
        if allowed.contains(&next) {
            next
        } else {
            allowed[0]
        }
    }
}

/// Engagement-weighted selection: agents who spoke less recently, or who
/// carry more internal tension, are favored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicSelection;

impl DynamicSelection {
    fn score(
        candidate: &SpeakerCandidate<'_>,
        history: &TurnHistory,
        last_speaker: Option<&str>,
        stagnation: f32,
    ) -> f32 {
        let participation = history.participation(candidate.name, PARTICIPATION_WINDOW) as f32;
        let mut score = PARTICIPATION_WINDOW as f32 - participation + 0.1 * candidate.imbalance;
        if stagnation >= STAGNATION_SWITCH && Some(candidate.name) != last_speaker {
            score += STAGNATION_BONUS;
        }
        score
    }
}

impl SpeakerPolicy for DynamicSelection {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn choose(
        &self,
        candidates: &[SpeakerCandidate<'_>],
        history: &TurnHistory,
        stagnation: f32,
        rng: &mut StdRng,
    ) -> usize {
        if candidates.is_empty() || history.last_agent_turn().is_none() {
            return 0;
        }
        let last_speaker = history.last_agent_turn().map(|t| t.speaker.as_str());
        let allowed = eligible(candidates, history);
        if allowed.len() == 1 {
            return allowed[0];
        }

        let mut best = allowed[0];
        let mut best_score = f32::MIN;
        for &i in &allowed {
            let jitter: f32 = rng.gen_range(0.9..1.2);
            let s = Self::score(&candidates[i], history, last_speaker, stagnation) * jitter;
            tracing::trace!(speaker = candidates[i].name, score = s, "speaker score");
            if s > best_score {
                best = i;
                best_score = s;
            }
        }
        best
    }
}
