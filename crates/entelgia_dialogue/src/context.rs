//! Prompt assembly under a character budget.
//!
//! Blocks are admitted in priority order (persona, seed, dialogue tail,
//! long-term memories, short-term thoughts) until the budget runs out, so the
//! lowest-priority material is the first to go. The trailer with rules and
//! directives is never truncated.

use crate::postprocess::BehaviorRule;
use entelgia_core::persona::Persona;
use entelgia_core::state::AgentState;
use entelgia_core::text::truncate_at_word;
use entelgia_core::TurnHistory;
use entelgia_limbic::PressureDirective;
use entelgia_memory::{MemoryEntry, StmEntry};

pub const DIALOGUE_TAIL_TURNS: usize = 8;
const DIALOGUE_LINE_CHARS: usize = 200;
const LTM_LINE_CHARS: usize = 200;
const STM_LINE_CHARS: usize = 150;
const IMPORTANT_MARK: f32 = 0.7;

pub const CAUTION_LINE: &str =
    "Energy is low: if unsure, say so plainly rather than invent details.";

/// How many long-term memories the agent can hold in view.
pub fn ltm_depth(state: &AgentState) -> usize {
    let depth = 2.0 + 6.0 * (state.drives.ego / 10.0) * state.self_awareness;
    (depth.round() as usize).clamp(2, 8)
}

/// How many recent thoughts the agent can hold in view.
pub fn stm_depth(state: &AgentState) -> usize {
    let depth = 6.0 * state.drives.ego / 10.0;
    (depth.round() as usize).clamp(1, 6)
}

/// Everything one agent turn's prompt is built from.
pub struct PromptInputs<'a> {
    pub persona: &'a dyn Persona,
    pub show_pronoun: bool,
    pub state: &'a AgentState,
    pub rule: BehaviorRule,
    /// Rendered seed instruction, including its `TOPIC:` line.
    pub seed: &'a str,
    pub history: &'a TurnHistory,
    /// Relevant long-term memories, best first.
    pub ltm: &'a [MemoryEntry],
    /// Short-term tail, oldest first.
    pub stm: &'a [&'a StmEntry],
    pub directive: PressureDirective,
    /// Hallucination risk was flagged on the previous turn.
    pub caution: bool,
    pub max_words: usize,
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    pub fn build(&self, inputs: &PromptInputs<'_>) -> String {
        let mut remaining = self.budget_chars;
        let mut sections: Vec<String> = Vec::new();

        // Persona and seed are always admitted.
        let persona = persona_block(inputs);
        let seed = inputs.seed.to_string();
        remaining = remaining.saturating_sub(persona.len() + seed.len());
        sections.push(persona);
        sections.push(seed);

        let dialogue: Vec<String> = inputs
            .history
            .tail(DIALOGUE_TAIL_TURNS)
            .iter()
            .map(|t| format!("{}: {}", t.speaker, truncate_at_word(&t.text, DIALOGUE_LINE_CHARS)))
            .collect();
        if let Some(block) = fit_newest_first("== RECENT DIALOGUE ==", dialogue, &mut remaining) {
            sections.push(block);
        }

        let ltm: Vec<String> = inputs
            .ltm
            .iter()
            .take(ltm_depth(inputs.state))
            .map(|m| {
                let mark = if m.importance > IMPORTANT_MARK { "* " } else { "" };
                format!("- {}{}", mark, truncate_at_word(&m.content, LTM_LINE_CHARS))
            })
            .collect();
        if let Some(block) = fit_in_order("== LONG-TERM MEMORIES ==", ltm, &mut remaining) {
            sections.push(block);
        }

        let depth = stm_depth(inputs.state);
        let skip = inputs.stm.len().saturating_sub(depth);
        let stm: Vec<String> = inputs.stm[skip..]
            .iter()
            .map(|e| format!("- {}", truncate_at_word(&e.text, STM_LINE_CHARS)))
            .collect();
        if let Some(block) = fit_newest_first("== RECENT THOUGHTS ==", stm, &mut remaining) {
            sections.push(block);
        }

        sections.push(trailer(inputs));
        sections.join("\n\n")
    }
}

fn persona_block(inputs: &PromptInputs<'_>) -> String {
    let drives = &inputs.state.drives;
    let profile = drives.debate_profile();
    format!(
        "{}\n{}\n[Drives: id={:.1} ego={:.1} superego={:.1}]\nStyle: {}. {}",
        inputs.persona.header(inputs.show_pronoun),
        inputs.persona.format(drives),
        drives.id,
        drives.ego,
        drives.superego,
        profile.style.label(),
        profile.style.opening_rule()
    )
}

fn trailer(inputs: &PromptInputs<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(rule) = inputs.rule.prompt_line(inputs.state) {
        lines.push(rule.to_string());
    }
    lines.extend(inputs.directive.prompt_lines().into_iter().map(str::to_string));
    if inputs.caution {
        lines.push(CAUTION_LINE.to_string());
    }
    let limit = inputs
        .directive
        .word_cap()
        .map_or(inputs.max_words, |cap| cap.min(inputs.max_words));
    lines.push(format!("Respond in at most {} words.", limit));
    lines.push("Respond now:".to_string());
    lines.join("\n")
}

/// Keep the newest lines that fit, presented oldest first.
fn fit_newest_first(header: &str, lines: Vec<String>, remaining: &mut usize) -> Option<String> {
    let mut budget = remaining.checked_sub(header.len() + 2)?;
    let mut kept: Vec<String> = Vec::new();
    for line in lines.into_iter().rev() {
        let cost = line.len() + 1;
        if cost > budget {
            break;
        }
        budget -= cost;
        kept.push(line);
    }
    if kept.is_empty() {
        return None;
    }
    kept.reverse();
    *remaining = budget;
    Some(format!("{}\n{}", header, kept.join("\n")))
}

/// Keep the leading lines that fit.
fn fit_in_order(header: &str, lines: Vec<String>, remaining: &mut usize) -> Option<String> {
    let mut budget = remaining.checked_sub(header.len() + 2)?;
    let mut kept: Vec<String> = Vec::new();
    for line in lines {
        let cost = line.len() + 1;
        if cost > budget {
            break;
        }
        budget -= cost;
        kept.push(line);
    }
    if kept.is_empty() {
        return None;
    }
    *remaining = budget;
    Some(format!("{}\n{}", header, kept.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use entelgia_core::state::DriveVector;
    use entelgia_core::{DialogueTurn, RichPersona, SeedStrategy, TurnRole};
    use entelgia_memory::MemoryLayer;

    fn history(n: u32) -> TurnHistory {
        let mut h = TurnHistory::new();
        for i in 1..=n {
            h.push(DialogueTurn {
                index: i,
                speaker: if i % 2 == 1 { "Socrates" } else { "Athena" }.to_string(),
                role: TurnRole::Agent,
                text: format!("Turn number {} says something about truth and memory.", i),
                topic: "truth".to_string(),
                timestamp: Utc::now(),
                seed_strategy: None,
            });
        }
        h
    }

    fn inputs<'a>(
        persona: &'a RichPersona,
        state: &'a AgentState,
        seed: &'a str,
        history: &'a TurnHistory,
        ltm: &'a [MemoryEntry],
        stm: &'a [&'a StmEntry],
    ) -> PromptInputs<'a> {
        PromptInputs {
            persona,
            show_pronoun: true,
            state,
            rule: BehaviorRule::None,
            seed,
            history,
            ltm,
            stm,
            directive: PressureDirective::evaluate(state.pressure, &state.drives),
            caution: false,
            max_words: 150,
        }
    }

    #[test]
    fn test_depths_scale_with_ego() {
        let mut state = AgentState::default();
        state.drives = DriveVector::new(5.0, 10.0, 5.0);
        state.self_awareness = 1.0;
        assert_eq!(ltm_depth(&state), 8);
        assert_eq!(stm_depth(&state), 6);

        state.drives = DriveVector::new(5.0, 0.0, 5.0);
        assert_eq!(ltm_depth(&state), 2);
        assert_eq!(stm_depth(&state), 1);

        // Baseline: 2 + 6*0.5*0.55 = 3.65
        assert_eq!(ltm_depth(&AgentState::default()), 4);
        assert_eq!(stm_depth(&AgentState::default()), 3);
    }

    #[test]
    fn test_prompt_layout() {
        let persona = RichPersona::socrates();
        let state = AgentState::default();
        let seed = SeedStrategy::Synthesize.render("truth & epistemology");
        let h = history(3);
        let ltm = vec![MemoryEntry::new("Socrates", MemoryLayer::Conscious, "Truth is earned.")
            .with_importance(0.9)];
        let stm_entry = StmEntry::new("A passing thought.", "truth", "neutral", 0.1);
        let stm = vec![&stm_entry];
        let prompt = ContextAssembler::new(6000).build(&inputs(&persona, &state, &seed, &h, &ltm, &stm));

        assert!(prompt.starts_with("Socrates (he):"));
        assert!(prompt.contains("[Drives: id=5.0 ego=5.0 superego=5.0]"));
        assert!(prompt.contains("TOPIC: truth & epistemology"));
        assert!(prompt.contains("Athena: Turn number 2"));
        assert!(prompt.contains("- * Truth is earned."));
        assert!(prompt.contains("- A passing thought."));
        assert!(prompt.contains("Respond in at most 150 words."));
        assert!(prompt.ends_with("Respond now:"));

        let persona_at = prompt.find("Socrates (he):").unwrap();
        let dialogue_at = prompt.find("== RECENT DIALOGUE ==").unwrap();
        let ltm_at = prompt.find("== LONG-TERM MEMORIES ==").unwrap();
        let stm_at = prompt.find("== RECENT THOUGHTS ==").unwrap();
        assert!(persona_at < dialogue_at && dialogue_at < ltm_at && ltm_at < stm_at);
    }

    #[test]
    fn test_tight_budget_drops_lowest_priority_first() {
        let persona = RichPersona::athena();
        let state = AgentState::default();
        let seed = SeedStrategy::Synthesize.render("truth");
        let h = history(8);
        let ltm = vec![MemoryEntry::new("Athena", MemoryLayer::Conscious, "Patterns persist.")];
        let stm_entry = StmEntry::new("Loose thread.", "truth", "neutral", 0.1);
        let stm = vec![&stm_entry];
        let full = inputs(&persona, &state, &seed, &h, &ltm, &stm);

        let fixed = persona_block(&full).len() + seed.len();
        // Room for the fixed blocks and a couple of dialogue lines only.
        let prompt = ContextAssembler::new(fixed + 150).build(&full);
        assert!(prompt.contains("== RECENT DIALOGUE =="));
        assert!(prompt.contains("Turn number 8"));
        assert!(!prompt.contains("Turn number 1 "));
        assert!(!prompt.contains("== LONG-TERM MEMORIES =="));
        assert!(!prompt.contains("== RECENT THOUGHTS =="));
        assert!(prompt.ends_with("Respond now:"));
    }

    #[test]
    fn test_trailer_directives_and_caution() {
        let persona = RichPersona::socrates();
        let mut state = AgentState::default();
        state.drives = DriveVector::new(4.0, 3.0, 8.0);
        state.pressure = 9.0;
        let seed = SeedStrategy::Synthesize.render("truth");
        let h = TurnHistory::new();
        let mut inp = inputs(&persona, &state, &seed, &h, &[], &[]);
        inp.rule = BehaviorRule::Questioner;
        inp.caution = true;
        let prompt = ContextAssembler::new(6000).build(&inp);
        assert!(prompt.contains("Stop framing. Decide."));
        assert!(prompt.contains("accept, resist, or transcend"));
        assert!(prompt.contains("binary question"));
        assert!(prompt.contains(CAUTION_LINE));
        assert!(prompt.contains("Respond in at most 80 words."));
    }
}
