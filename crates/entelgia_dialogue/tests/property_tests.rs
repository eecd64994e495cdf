//! Property-based tests for entelgia_dialogue post-processing and speaker policies.
//!
//! Verifies that post-processing never panics and always honours its word
//! cap, that dissent enforcement leaves exactly one marker sentence, and that
//! no policy ever grants a third consecutive turn.

use chrono::Utc;
use entelgia_core::state::AgentState;
use entelgia_core::text::{sentences, word_count};
use entelgia_core::{DialogueMode, DialogueTurn, TurnHistory, TurnRole};
use entelgia_dialogue::postprocess::{enforce_dissent_marker, postprocess, BehaviorRule, PostContext};
use entelgia_dialogue::speaker::{policy_for, SpeakerCandidate};
use entelgia_limbic::PressureDirective;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ============================================================================
// Post-processing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// **Never panics** and never exceeds the configured word cap.
    #[test]
    fn postprocess_respects_cap(
        raw in "\\PC{0,600}",
        pressure in 0.0f32..=10.0,
        max_words in 20usize..=150,
        dissenter in any::<bool>(),
    ) {
        let state = AgentState { pressure, ..AgentState::default() };
        let directive = PressureDirective::evaluate(pressure, &state.drives);
        let ctx = PostContext {
            name: "Athena",
            rule: if dissenter { BehaviorRule::Dissenter } else { BehaviorRule::Questioner },
            state: &state,
            directive,
            max_words,
        };
        let out = postprocess(&raw, &ctx);
        prop_assert!(word_count(&out) <= max_words);
        if let Some(cap) = directive.word_cap() {
            prop_assert!(word_count(&out) <= cap);
        }
    }

    /// **Exactly one** sentence opens with a dissent marker afterwards.
    #[test]
    fn dissent_marker_exactly_once(
        parts in prop::collection::vec(
            (prop::option::of(prop::sample::select(vec!["However, ", "Yet, ", "However ", "yet ", "YET, "])),
             prop::collection::vec("[a-z]{1,8}", 1..8)),
            1..6,
        )
    ) {
        let text = parts
            .iter()
            .map(|(marker, words)| format!("{}{}.", marker.unwrap_or(""), words.join(" ")))
            .collect::<Vec<_>>()
            .join(" ");
        let out = enforce_dissent_marker(&text);
        let markers = sentences(&out)
            .iter()
            .filter(|s| s.starts_with("However,") || s.starts_with("Yet,"))
            .count();
        prop_assert_eq!(markers, 1, "input {:?} -> {:?}", text, out);
    }
}

// ============================================================================
// Speaker policies
// ============================================================================

proptest! {
    /// **No third consecutive turn**, whatever the imbalances, stagnation or
    /// observer interruptions.
    #[test]
    fn policies_never_grant_third_turn(
        dynamic in any::<bool>(),
        seed in any::<u64>(),
        imbalances in prop::collection::vec(0.0f32..=20.0, 2..4),
        stagnation in 0.0f32..=1.0,
        observer_after in prop::collection::vec(any::<bool>(), 40),
    ) {
        let names = ["Socrates", "Athena", "Hermes"];
        let candidates: Vec<SpeakerCandidate<'_>> = imbalances
            .iter()
            .enumerate()
            .map(|(i, &imbalance)| SpeakerCandidate { name: names[i], imbalance })
            .collect();
        let policy = policy_for(if dynamic { DialogueMode::Dynamic } else { DialogueMode::Simple });
        let mut rng = StdRng::seed_from_u64(seed);
        let mut history = TurnHistory::new();

        let mut last: Option<usize> = None;
        let mut run = 0;
        for observe in observer_after {
            let idx = policy.choose(&candidates, &history, stagnation, &mut rng);
            run = if Some(idx) == last { run + 1 } else { 1 };
            last = Some(idx);
            prop_assert!(run <= 2);

            history.push(turn(history.len(), candidates[idx].name, TurnRole::Agent));
            if observe {
                history.push(turn(history.len(), "Fixy", TurnRole::Observer));
            }
        }
    }
}

fn turn(len: usize, speaker: &str, role: TurnRole) -> DialogueTurn {
    DialogueTurn {
        index: len as u32 + 1,
        speaker: speaker.to_string(),
        role,
        text: "text".to_string(),
        topic: "truth".to_string(),
        timestamp: Utc::now(),
        seed_strategy: None,
    }
}
