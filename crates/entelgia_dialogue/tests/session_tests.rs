//! Integration tests for the Session turn loop
//!
//! Uses tempfile::TempDir for isolated SQLite databases and STM snapshots,
//! and the scripted MockProvider in place of a completion service.

use entelgia_core::state::DriveVector;
use entelgia_core::text::word_count;
use entelgia_core::{DialogueMode, EntelgiaConfig, SigningKey, TurnRole};
use entelgia_dialogue::observer::InterventionKind;
use entelgia_dialogue::{
    LlmClient, MockProvider, MockReply, Session, TurnError, FALLBACK_INTERVENTION,
};
use entelgia_memory::short_term::snapshot_path;
use entelgia_memory::MemoryLayer;
use std::sync::Arc;
use tempfile::TempDir;

fn config(dir: &TempDir) -> EntelgiaConfig {
    let mut cfg = EntelgiaConfig::default();
    cfg.memory.data_dir = dir.path().to_path_buf();
    cfg.dialogue.rng_seed = Some(7);
    cfg.llm.max_retries = 1;
    cfg.llm.initial_backoff_ms = 1;
    cfg.llm.max_backoff_ms = 2;
    cfg
}

fn key() -> SigningKey {
    SigningKey::new("session-test-key").unwrap()
}

async fn session(cfg: EntelgiaConfig, mock: &Arc<MockProvider>) -> Session {
    let client: Arc<dyn LlmClient> = mock.clone();
    Session::new(cfg, client, key()).await.unwrap()
}

/// Test 1: A long mock session keeps every invariant of the turn loop
#[tokio::test]
async fn test_fifty_turn_session_invariants() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockProvider::new("mock"));
    let mut s = session(config(&dir), &mock).await;

    let mut energies = Vec::new();
    let mut pressures = Vec::new();
    let summary = s
        .run(50, |event| {
            if let entelgia_dialogue::TurnEvent::Completed(outcome) = event {
                energies.push(outcome.energy);
                pressures.push(outcome.pressure);
            }
        })
        .await
        .unwrap();

    assert_eq!(summary.turns_completed, 50);
    assert_eq!(summary.failed_turns, 0);
    assert!(energies.iter().all(|e| (0.0..=100.0).contains(e)));
    assert!(pressures.iter().all(|p| (0.0..=10.0).contains(p)));

    // No agent ever holds three consecutive non-observer turns.
    let mut last: Option<&str> = None;
    let mut run = 0;
    for turn in s.history().all().iter().filter(|t| t.role == TurnRole::Agent) {
        if Some(turn.speaker.as_str()) == last {
            run += 1;
        } else {
            last = Some(turn.speaker.as_str());
            run = 1;
        }
        assert!(run <= 2, "{} spoke {} turns in a row", turn.speaker, run);
    }

    // Observer turns never follow each other.
    let turns = s.history().all();
    for pair in turns.windows(2) {
        assert!(!(pair[0].is_observer() && pair[1].is_observer()));
    }

    // Every completed turn wrote one subconscious memory for its speaker.
    let socrates = s.store().count("Socrates", MemoryLayer::Subconscious).await.unwrap();
    let athena = s.store().count("Athena", MemoryLayer::Subconscious).await.unwrap();
    assert_eq!(socrates + athena, 50);
}

/// Test 2: A failed completion leaves state and memory untouched
#[tokio::test]
async fn test_completion_failure_is_side_effect_free() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockProvider::scripted(vec![
        MockReply::Fail("connection refused".into()),
        MockReply::Fail("connection refused".into()),
    ]));
    let mut s = session(config(&dir), &mock).await;

    let err = s.run_turn().await.unwrap_err();
    match &err {
        TurnError::CompletionFailed { agent, attempts, .. } => {
            assert_eq!(agent, "Socrates");
            assert_eq!(*attempts, 2);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("turn failed"));

    assert!(s.history().is_empty());
    assert_eq!(s.agent_turns(), 0);
    let socrates = s.agent("Socrates").unwrap();
    assert_eq!(socrates.state.energy, 100.0);
    assert_eq!(socrates.state.drives, DriveVector::default());
    assert!(socrates.stm().is_empty());
    assert_eq!(s.store().count("Socrates", MemoryLayer::Subconscious).await.unwrap(), 0);

    // The next attempt goes through normally.
    let outcome = s.run_turn().await.unwrap();
    assert_eq!(outcome.turn.speaker, "Socrates");
    assert_eq!(s.history().len(), 1);
}

/// Test 3: High pressure with a dominant superego forces a short three-way answer
#[tokio::test]
async fn test_pressure_rewrites_dilemma_and_caps_length() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.dialogue.observer_enabled = false;

    let filler = "Each word here adds weight to the argument we keep making. ".repeat(12);
    let mock = Arc::new(MockProvider::scripted(vec![
        MockReply::Text(format!("Socrates (he): Is identity memory or is it choice? {}", filler)),
        MockReply::Text("The draft treats doubt as weakness.".into()),
    ]));
    let mut s = session(cfg, &mock).await;
    {
        let socrates = s.agent_mut("Socrates").unwrap();
        socrates.state.drives = DriveVector::new(4.0, 3.0, 8.0);
        socrates.state.pressure = 9.0;
    }

    let outcome = s.run_turn().await.unwrap();
    let text = &outcome.turn.text;
    assert!(text.starts_with("Is identity memory: accept it, resist it, or transcend it?"));
    assert!(word_count(text) <= 80);
    assert!(text.ends_with('.') || text.ends_with('?') || text.ends_with('!'));

    let calls = mock.recorded().await;
    assert_eq!(calls.len(), 2);
    assert!(calls[0].prompt.contains("Stop framing. Decide."));
    assert!(calls[0].prompt.contains("Respond in at most 80 words."));
    // Second call is the governor pass, at low temperature.
    assert!((calls[1].temperature - 0.25).abs() < 1e-6);

    let socrates = s.agent("Socrates").unwrap();
    assert_eq!(
        socrates.state.governor_audit.as_deref(),
        Some("The draft treats doubt as weakness.")
    );
    // The critique never becomes dialogue.
    assert!(!text.contains("doubt as weakness"));
}

/// Test 4: Checkpointed state survives into a new session
#[tokio::test]
async fn test_checkpoint_and_restore() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockProvider::new("mock"));

    let (energy, drives, stm_len) = {
        let mut s = session(config(&dir), &mock).await;
        s.run(4, |_| {}).await.unwrap();
        let socrates = s.agent("Socrates").unwrap();
        (socrates.state.energy, socrates.state.drives, socrates.stm().len())
    };

    let mut s = session(config(&dir), &mock).await;
    assert_eq!(s.agent("Socrates").unwrap().state.energy, 100.0);
    assert_eq!(s.restore_agents().await.unwrap(), 2);

    let socrates = s.agent("Socrates").unwrap();
    assert!((socrates.state.energy - energy).abs() < 1e-3);
    assert!((socrates.state.drives.ego - drives.ego).abs() < 1e-3);
    assert!((socrates.state.drives.superego - drives.superego).abs() < 1e-3);
    assert_eq!(socrates.stm().len(), stm_len);
}

/// Test 5: A stop word in an agent's reply ends the session after that turn
#[tokio::test]
async fn test_stop_signal_ends_session() {
    let dir = TempDir::new().unwrap();
    let mock = Arc::new(MockProvider::scripted(vec![MockReply::Text(
        "I think we should stop here.".into(),
    )]));
    let mut s = session(config(&dir), &mock).await;

    let summary = s.run(10, |_| {}).await.unwrap();
    assert_eq!(summary.turns_completed, 1);
    assert!(summary.stopped);
    assert!(s.is_stopped());
}

/// Test 6: When the observer's completion fails, it still speaks with the fallback line
#[tokio::test]
async fn test_observer_fallback_on_persona_collapse() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.dialogue.mode = DialogueMode::Simple;

    let line = "Memory shapes identity through careful narrative choices.";
    let mock = Arc::new(MockProvider::scripted(vec![
        MockReply::Text(line.into()),
        MockReply::Text(line.into()),
        MockReply::Text(line.into()),
        MockReply::Fail("observer offline".into()),
        MockReply::Fail("observer offline".into()),
    ]));
    let mut s = session(cfg, &mock).await;

    let first = s.run_turn().await.unwrap();
    assert!(first.intervention.is_none());
    let second = s.run_turn().await.unwrap();
    assert_eq!(second.turn.speaker, "Athena");
    assert!(second.turn.text.starts_with("However, memory shapes identity"));
    assert!(second.intervention.is_none());

    let third = s.run_turn().await.unwrap();
    let (kind, turn) = third.intervention.expect("observer should intervene");
    assert_eq!(kind, InterventionKind::PersonaCollapse);
    assert_eq!(turn.speaker, "Fixy");
    assert_eq!(turn.role, TurnRole::Observer);
    assert_eq!(turn.text, FALLBACK_INTERVENTION);

    // Interventions are not agent turns.
    assert_eq!(s.agent_turns(), 3);
    assert_eq!(s.history().len(), 4);
    assert_eq!(s.store().count("Fixy", MemoryLayer::Subconscious).await.unwrap(), 0);
}

/// Test 7: Out-of-range configuration is rejected before anything is opened
#[tokio::test]
async fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.llm.max_retries = 0;
    let client: Arc<dyn LlmClient> = Arc::new(MockProvider::new("mock"));
    assert!(Session::new(cfg, client, key()).await.is_err());
    assert!(!dir.path().join("entelgia_memory.sqlite").exists());
}

/// Test 8: A store failure after the memory write still leaves the turn recorded
#[tokio::test]
async fn test_failed_dream_keeps_turn_recorded() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.dialogue.observer_enabled = false;
    let mock = Arc::new(MockProvider::scripted(vec![MockReply::Text(
        "Memory shapes identity more than any single choice does.".into(),
    )]));
    let mut s = session(cfg, &mock).await;
    s.agent_mut("Socrates").unwrap().state.energy = 10.0;

    // A directory where the STM snapshot should go makes the dream's flush fail.
    let snapshot = snapshot_path(dir.path(), "Socrates");
    let _ = std::fs::remove_file(&snapshot);
    std::fs::create_dir_all(&snapshot).unwrap();

    let err = s.run_turn().await.unwrap_err();
    assert!(matches!(err, TurnError::Store(_)), "unexpected error: {}", err);
    assert!(!err.is_retryable());

    assert_eq!(s.history().len(), 1);
    assert_eq!(s.history().all()[0].speaker, "Socrates");
    assert_eq!(s.agent_turns(), 1);
    assert_eq!(s.agent("Socrates").unwrap().stm().len(), 1);
    assert_eq!(s.store().count("Socrates", MemoryLayer::Subconscious).await.unwrap(), 1);
}
