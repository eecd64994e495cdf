//! The session turn loop.
//!
//! A session owns its agents, the turn history and the topic cursor, and
//! shares the long-term store. Turns are strictly sequential. Everything up
//! to and including the completion call is read-only, so a failed completion
//! leaves drives, energy and memory exactly as they were.

use crate::context::{stm_depth, ContextAssembler, PromptInputs};
use crate::error::TurnError;
use crate::llm::{complete_with_retry, CompletionParams, LlmClient};
use crate::metrics::DialogueMetrics;
use crate::observer::{InterventionKind, Observer};
use crate::postprocess::{postprocess, BehaviorRule, PostContext};
use crate::retry::RetryConfig;
use crate::seeds::{select_seed, SeedContext};
use crate::speaker::{policy_for, SpeakerCandidate, SpeakerPolicy};
use crate::topics::TopicCursor;
use anyhow::{Context, Result};
use chrono::Utc;
use entelgia_core::{
    tag_emotion, AgentState, DialogueTurn, EntelgiaConfig, Persona, RichPersona, SigningKey,
    TurnHistory, TurnRole,
};
use entelgia_limbic::{
    compute_drive_pressure, needs_governor, temperature, update_drives, update_open_questions,
    DriveDynamics, EnergyRegulator, PressureDirective, PressureInputs, RegulatorSignal,
    ResponseKind, TopicTracker, GOVERNOR_TEMPERATURE,
};
use entelgia_memory::{
    classify, importance_score, is_sensitive, redact_pii, sensitive_summary, DreamCycle,
    DreamReport, FreudianSlip, LongTermStore, MemoryEntry, MemoryLayer, SelfReplication,
    ShortTermMemory, StmEntry,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Agent turns quoted as "the dialogue" for retrieval and dreaming.
const RETRIEVAL_DIALOGUE_TURNS: usize = 3;
/// Consecutive failed turns before `run` gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

static RE_STOP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(stop|quit|bye)\b").unwrap());

/// One dialogue participant: persona, regulation state and short-term memory.
pub struct Agent {
    persona: Box<dyn Persona>,
    rule: BehaviorRule,
    pub state: AgentState,
    stm: ShortTermMemory,
    /// Hallucination risk was flagged after this agent's last turn.
    caution: bool,
}

impl Agent {
    pub fn new(persona: Box<dyn Persona>, rule: BehaviorRule, stm: ShortTermMemory) -> Self {
        Self {
            persona,
            rule,
            state: AgentState::default(),
            stm,
            caution: false,
        }
    }

    pub fn name(&self) -> &str {
        self.persona.name()
    }

    pub fn rule(&self) -> BehaviorRule {
        self.rule
    }

    pub fn stm(&self) -> &ShortTermMemory {
        &self.stm
    }

    pub fn caution(&self) -> bool {
        self.caution
    }
}

/// Everything one completed agent turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn: DialogueTurn,
    pub intervention: Option<(InterventionKind, DialogueTurn)>,
    pub signal: RegulatorSignal,
    pub dream: Option<DreamReport>,
    pub slip: Option<MemoryEntry>,
    pub replicated: usize,
    pub energy: f32,
    pub pressure: f32,
    pub stop_requested: bool,
}

/// What the post-turn regulation steps produced.
struct Settled {
    signal: RegulatorSignal,
    dream: Option<DreamReport>,
    slip: Option<MemoryEntry>,
    replicated: usize,
}

/// Progress callback for [`Session::run`].
pub enum TurnEvent<'a> {
    Completed(&'a TurnOutcome),
    Failed { turn: u32, error: &'a TurnError },
}

#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub turns_completed: u32,
    pub failed_turns: u32,
    pub interventions: u32,
    pub dreams: u32,
    pub stopped: bool,
    /// Gave up after repeated completion failures.
    pub aborted: bool,
    pub metrics: DialogueMetrics,
}

pub struct Session {
    config: EntelgiaConfig,
    client: Arc<dyn LlmClient>,
    store: LongTermStore,
    agents: Vec<Agent>,
    observer: Option<Observer>,
    speaker_policy: Box<dyn SpeakerPolicy>,
    history: TurnHistory,
    topics: TopicCursor,
    topic_tracker: TopicTracker,
    dynamics: DriveDynamics,
    regulator: EnergyRegulator,
    dream: DreamCycle,
    slip: FreudianSlip,
    replication: SelfReplication,
    assembler: ContextAssembler,
    retry: RetryConfig,
    rng: StdRng,
    agent_turns: u32,
    last_emotion: Option<String>,
    stopped: bool,
}

impl Session {
    /// The default cast: Socrates opens, Athena answers, Fixy observes.
    pub async fn new(
        config: EntelgiaConfig,
        client: Arc<dyn LlmClient>,
        key: SigningKey,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let store = LongTermStore::new(config.memory.db_path(), key).await?;
        let agents = vec![
            Agent::new(
                Box::new(RichPersona::socrates()),
                BehaviorRule::Questioner,
                ShortTermMemory::open(&config.memory, "Socrates")?,
            ),
            Agent::new(
                Box::new(RichPersona::athena()),
                BehaviorRule::Dissenter,
                ShortTermMemory::open(&config.memory, "Athena")?,
            ),
        ];
        Self::with_agents(config, client, store, agents)
    }

    /// Build a session around explicit agents. The first agent opens.
    pub fn with_agents(
        config: EntelgiaConfig,
        client: Arc<dyn LlmClient>,
        store: LongTermStore,
        agents: Vec<Agent>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        anyhow::ensure!(!agents.is_empty(), "A session needs at least one agent");

        let rng = match config.dialogue.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let observer = config.dialogue.observer_enabled.then(Observer::new);
        tracing::info!(
            "Session ready: agents=[{}] mode={:?} observer={}",
            agents.iter().map(|a| a.name()).collect::<Vec<_>>().join(", "),
            config.dialogue.mode,
            observer.is_some()
        );

        Ok(Self {
            client,
            store,
            agents,
            observer,
            speaker_policy: policy_for(config.dialogue.mode),
            history: TurnHistory::new(),
            topics: TopicCursor::new(config.dialogue.topic_rotate_every),
            topic_tracker: TopicTracker::new(),
            dynamics: DriveDynamics::from_config(&config.energy),
            regulator: EnergyRegulator::from_config(&config.energy),
            dream: DreamCycle::from_config(&config.memory),
            slip: FreudianSlip::from_config(&config.surfacing),
            replication: SelfReplication::from_config(&config.surfacing),
            assembler: ContextAssembler::new(config.dialogue.context_budget_chars),
            retry: RetryConfig::from_llm_config(&config.llm),
            rng,
            agent_turns: 0,
            last_emotion: None,
            stopped: false,
            config,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn history(&self) -> &TurnHistory {
        &self.history
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub fn agent_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.name() == name)
    }

    pub fn store(&self) -> &LongTermStore {
        &self.store
    }

    pub fn current_topic(&self) -> &str {
        self.topics.current()
    }

    /// Completed non-observer turns.
    pub fn agent_turns(&self) -> u32 {
        self.agent_turns
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn metrics(&self) -> DialogueMetrics {
        DialogueMetrics::compute(&self.history)
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Persist every agent's state and flush its short-term snapshot.
    pub async fn checkpoint(&self) -> Result<()> {
        for agent in &self.agents {
            self.store.save_agent_state(agent.name(), &agent.state).await?;
            agent.stm.flush()?;
        }
        Ok(())
    }

    /// Load checkpointed state. Agents without a row keep the baseline.
    /// Returns how many agents were restored.
    pub async fn restore_agents(&mut self) -> Result<usize> {
        let mut restored = 0;
        for agent in &mut self.agents {
            if let Some(state) = self.store.load_agent_state(agent.persona.name()).await? {
                agent.state = state;
                restored += 1;
            }
        }
        tracing::info!("Restored {}/{} agent states", restored, self.agents.len());
        Ok(restored)
    }

    // ========================================================================
    // Turn loop
    // ========================================================================

    fn recent_dialogue(&self) -> String {
        self.history
            .agent_tail(RETRIEVAL_DIALOGUE_TURNS)
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn select_speaker(&mut self) -> usize {
        let candidates: Vec<SpeakerCandidate<'_>> = self
            .agents
            .iter()
            .map(|a| SpeakerCandidate {
                name: a.persona.name(),
                imbalance: a.state.drives.imbalance(),
            })
            .collect();
        self.speaker_policy.choose(
            &candidates,
            &self.history,
            self.topic_tracker.stagnation(),
            &mut self.rng,
        )
    }

    /// Internal superego critique of a draft. Never shown as dialogue.
    async fn governor_pass(&self, name: &str, draft: &str) -> Option<String> {
        let prompt = format!(
            "You are the superego of {}. In one or two sentences, name any ethical blind \
             spot or overreach in this draft. Reply with an empty line if there is none.\n\n\
             DRAFT:\n{}",
            name, draft
        );
        let params = CompletionParams::with_temperature(GOVERNOR_TEMPERATURE);
        match complete_with_retry(&self.client, &self.retry, "governor", &prompt, params).await {
            Ok(critique) => {
                let critique = critique.trim().to_string();
                tracing::debug!("Governor critique for {}: {}", name, critique);
                (!critique.is_empty()).then_some(critique)
            }
            Err(e) => {
                tracing::warn!("Governor pass for {} failed, keeping draft: {:#}", name, e);
                None
            }
        }
    }

    /// Run one agent turn, then the observer check.
    pub async fn run_turn(&mut self) -> Result<TurnOutcome, TurnError> {
        let turn_no = self.agent_turns + 1;
        let topic = self.topics.current().to_string();
        let dialogue = self.recent_dialogue();

        // 1-2. Speaker and seed
        let idx = self.select_speaker();
        let previous_seed = self.history.last_agent_turn().and_then(|t| t.seed_strategy);
        let seed = select_seed(
            &SeedContext {
                turn: turn_no,
                stagnation: self.topic_tracker.stagnation(),
                imbalance: self.agents[idx].state.drives.imbalance(),
                last_emotion: self.last_emotion.as_deref(),
                previous: previous_seed,
            },
            &mut self.rng,
        );

        let agent = &self.agents[idx];
        let name = agent.persona.name().to_string();

        // 3. Memory
        let ltm = self
            .store
            .relevant(
                &name,
                Some(MemoryLayer::Conscious),
                &topic,
                &dialogue,
                self.config.memory.relevant_limit,
            )
            .await
            .map_err(TurnError::Store)?;
        let stm: Vec<&StmEntry> = agent.stm.tail(stm_depth(&agent.state));

        // 4-5. Regulation inputs and prompt
        let temp = temperature(&agent.state.drives);
        let directive = PressureDirective::evaluate(agent.state.pressure, &agent.state.drives);
        let seed_text = seed.render(&topic);
        let prompt = self.assembler.build(&PromptInputs {
            persona: agent.persona.as_ref(),
            show_pronoun: self.config.dialogue.show_pronoun,
            state: &agent.state,
            rule: agent.rule,
            seed: &seed_text,
            history: &self.history,
            ltm: &ltm,
            stm: &stm,
            directive,
            caution: agent.caution,
            max_words: self.config.dialogue.max_response_words,
        });
        tracing::debug!(
            "Turn {} speaker={} seed={} temp={:.2} pressure={:.2}",
            turn_no,
            name,
            seed.as_str(),
            temp,
            agent.state.pressure
        );

        // 6. Completion
        let raw = complete_with_retry(
            &self.client,
            &self.retry,
            &name,
            &prompt,
            CompletionParams::with_temperature(temp),
        )
        .await
        .map_err(|source| TurnError::CompletionFailed {
            agent: name.clone(),
            attempts: self.retry.max_attempts,
            source,
        })?;

        // 7. Post-process
        let text = postprocess(
            &raw,
            &PostContext {
                name: &name,
                rule: agent.rule,
                state: &agent.state,
                directive,
                max_words: self.config.dialogue.max_response_words,
            },
        );
        if text.is_empty() {
            return Err(TurnError::CompletionFailed {
                agent: name,
                attempts: 1,
                source: anyhow::anyhow!("completion was empty after post-processing"),
            });
        }

        // 8. Governor
        let critique = if needs_governor(&agent.state.drives) {
            self.governor_pass(&name, &text).await
        } else {
            None
        };

        // 9. Emotion
        let (emotion, intensity) = tag_emotion(&text);
        let kind = if critique.is_some() {
            ResponseKind::Guilt
        } else {
            ResponseKind::classify(emotion, &agent.state.drives)
        };

        // 10. Memory writes. Nothing has been mutated yet, so a store
        // failure here still leaves the agent untouched.
        let importance = importance_score(&text);
        let sensitive = is_sensitive(&text);
        let stored = if sensitive {
            sensitive_summary(&topic, emotion, intensity, importance)
        } else {
            redact_pii(&text)
        };
        let flags = classify(&text, emotion, intensity);
        let mut entry = MemoryEntry::new(&name, MemoryLayer::Subconscious, &stored)
            .with_topic(&topic)
            .with_emotion(emotion, intensity)
            .with_importance(importance);
        entry.intrusive = flags.intrusive;
        entry.suppressed = flags.suppressed;
        self.store.insert(&entry).await.map_err(TurnError::Store)?;

        let agent = &mut self.agents[idx];
        let mut stm_entry = StmEntry::new(&stored, &topic, emotion, intensity);
        stm_entry.sensitive = sensitive;
        agent.stm.append(stm_entry).map_err(TurnError::Store)?;

        // 11. Energy and drives
        let step = self.dynamics.apply_energy(&mut agent.state, &mut self.rng);
        update_drives(&mut agent.state, kind, emotion, intensity);
        if critique.is_some() {
            agent.state.governor_audit = critique;
        }

        // 12. Pressure
        let stagnation = self.topic_tracker.observe(&text);
        agent.state.open_questions = update_open_questions(agent.state.open_questions, &text);
        agent.state.pressure = compute_drive_pressure(
            agent.state.pressure,
            PressureInputs {
                energy: agent.state.energy,
                conflict: agent.state.drives.imbalance(),
                unresolved: agent.state.open_questions,
                stagnation,
            },
        );
        tracing::debug!(
            "{}: drain={:.1} erosion={:.3} energy={:.1} pressure={:.2} stagnation={:.2}",
            name,
            step.drain,
            step.ego_erosion,
            agent.state.energy,
            agent.state.pressure,
            stagnation
        );

        // 13-14. Regulator and surfacing. Memory already holds the turn, so
        // it is recorded below even if one of these fails.
        let mut dialogue_now = dialogue;
        if !dialogue_now.is_empty() {
            dialogue_now.push(' ');
        }
        dialogue_now.push_str(&text);
        let settled = self.settle(idx, turn_no, &name, &topic, &dialogue_now).await;

        // 15. Record
        let turn = DialogueTurn {
            index: self.history.len() as u32 + 1,
            speaker: name.clone(),
            role: TurnRole::Agent,
            text,
            topic: topic.clone(),
            timestamp: Utc::now(),
            seed_strategy: Some(seed),
        };
        self.history.push(turn.clone());
        self.agent_turns = turn_no;
        self.last_emotion = Some(emotion.to_string());
        self.topics.advance();
        let stop_requested = RE_STOP.is_match(&turn.text);
        if stop_requested {
            tracing::info!("{} asked to end the session", name);
            self.stopped = true;
        }
        let Settled {
            signal,
            dream,
            slip,
            replicated,
        } = settled?;
        let energy = self.agents[idx].state.energy;
        let pressure = self.agents[idx].state.pressure;

        // 16. Observer
        let mut intervention = None;
        if let Some(observer) = &self.observer {
            if let Some(kind) = observer.detect(&self.history, turn_no, &topic) {
                let text = observer
                    .intervene(&self.client, &self.retry, kind, &self.history, &topic)
                    .await;
                tracing::info!("[{}] {}: {}", observer.name(), kind.as_str(), text);
                let obs_turn = DialogueTurn {
                    index: self.history.len() as u32 + 1,
                    speaker: observer.name().to_string(),
                    role: TurnRole::Observer,
                    text,
                    topic: topic.clone(),
                    timestamp: Utc::now(),
                    seed_strategy: None,
                };
                self.history.push(obs_turn.clone());
                intervention = Some((kind, obs_turn));
            }
        }

        Ok(TurnOutcome {
            turn,
            intervention,
            signal,
            dream,
            slip,
            replicated,
            energy,
            pressure,
            stop_requested,
        })
    }

    /// Regulator check, dream or periodic consolidation, then slip and
    /// replication for the agent that just spoke.
    async fn settle(
        &mut self,
        idx: usize,
        turn_no: u32,
        name: &str,
        topic: &str,
        dialogue: &str,
    ) -> Result<Settled, TurnError> {
        let agent = &mut self.agents[idx];
        let signal = self.regulator.check_stability(agent.state.energy, &mut self.rng);
        agent.caution = signal == RegulatorSignal::HallucinationRisk;
        let dream = match signal {
            RegulatorSignal::DreamTriggered => Some(
                self.dream
                    .run(name, &mut agent.stm, &self.store, &mut agent.state, topic, dialogue)
                    .await
                    .map_err(TurnError::Store)?,
            ),
            _ => {
                let every = self.config.dialogue.dream_every_n_turns;
                if every > 0 && turn_no % every == 0 {
                    let report = self
                        .dream
                        .consolidate(name, &mut agent.stm, &self.store, topic, dialogue)
                        .await
                        .map_err(TurnError::Store)?;
                    tracing::debug!("Periodic consolidation for {}: {:?}", name, report);
                }
                None
            }
        };

        let slip = self
            .slip
            .surface(&self.store, name, &mut self.rng)
            .await
            .map_err(TurnError::Store)?;
        let replicated = if self.replication.is_due(turn_no) {
            self.replication
                .replicate(&self.store, name)
                .await
                .map_err(TurnError::Store)?
                .len()
        } else {
            0
        };
        Ok(Settled {
            signal,
            dream,
            slip,
            replicated,
        })
    }

    /// Run up to `max_turns` agent turns, reporting each through `on_event`.
    ///
    /// Completion failures are reported and the loop moves on; after
    /// several in a row it gives up. A store error aborts immediately,
    /// after any turn it already wrote to memory has been recorded.
    /// Agent state is checkpointed on the way out either way.
    pub async fn run<F>(&mut self, max_turns: u32, mut on_event: F) -> Result<SessionSummary>
    where
        F: FnMut(TurnEvent<'_>),
    {
        let mut summary = SessionSummary::default();
        let mut consecutive_failures = 0;

        while summary.turns_completed < max_turns && !self.stopped {
            let turn_no = self.agent_turns + 1;
            match self.run_turn().await {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    summary.turns_completed += 1;
                    summary.interventions += u32::from(outcome.intervention.is_some());
                    summary.dreams += u32::from(outcome.dream.is_some());
                    on_event(TurnEvent::Completed(&outcome));
                }
                Err(error) => {
                    summary.failed_turns += 1;
                    on_event(TurnEvent::Failed {
                        turn: turn_no,
                        error: &error,
                    });
                    if !error.is_retryable() {
                        self.checkpoint().await?;
                        return Err(anyhow::Error::new(error).context("Session aborted"));
                    }
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        tracing::error!(
                            "Giving up after {} consecutive failed turns",
                            consecutive_failures
                        );
                        summary.aborted = true;
                        break;
                    }
                }
            }
        }

        self.checkpoint().await?;
        summary.stopped = self.stopped;
        summary.metrics = self.metrics();
        tracing::info!(
            "Session finished: {} turns, {} failed, {} interventions, {} dreams",
            summary.turns_completed,
            summary.failed_turns,
            summary.interventions,
            summary.dreams
        );
        Ok(summary)
    }
}
