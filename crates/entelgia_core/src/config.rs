use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntelgiaConfig {
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub energy: EnergyConfig,
    pub surfacing: SurfacingConfig,
    pub dialogue: DialogueConfig,
}

impl EntelgiaConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: EntelgiaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ENTELGIA_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("OLLAMA_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("ENTELGIA_MAX_TURNS") {
            if let Ok(n) = v.parse() {
                self.dialogue.max_turns = n;
            }
        }
        if let Ok(v) = std::env::var("ENTELGIA_DATA_DIR") {
            self.memory.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ENTELGIA_SEED") {
            if let Ok(n) = v.parse() {
                self.dialogue.rng_seed = Some(n);
            }
        }
    }

    /// Reject out-of-range thresholds. Values are never clamped silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.llm.validate()?;
        self.memory.validate()?;
        self.energy.validate()?;
        self.surfacing.validate()?;
        self.dialogue.validate()?;
        Ok(())
    }
}

fn check_unit(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(ConfigError::out_of_range(field, format!("{} not in [0, 1]", v)));
    }
    Ok(())
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Per-attempt completion timeout.
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "phi3".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl LlmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs < 5 {
            return Err(ConfigError::out_of_range("llm.timeout_secs", "must be at least 5"));
        }
        if !(1..=10).contains(&self.max_retries) {
            return Err(ConfigError::out_of_range("llm.max_retries", "must be in 1..=10"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::out_of_range(
                "llm.initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }
        Ok(())
    }
}

/// Which promotion gate a short-term entry must clear to reach long-term memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionMode {
    /// Importance OR emotional intensity clears its threshold.
    #[default]
    Either,
    /// Both thresholds must be cleared.
    Both,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub data_dir: PathBuf,
    pub db_file: String,
    pub stm_max_entries: usize,
    pub stm_trim_batch: usize,
    pub promote_importance_threshold: f32,
    pub promote_emotion_threshold: f32,
    pub promotion_mode: PromotionMode,
    /// Default bound for "relevant" retrieval.
    pub relevant_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("entelgia_data"),
            db_file: "entelgia_memory.sqlite".to_string(),
            stm_max_entries: 10_000,
            stm_trim_batch: 500,
            promote_importance_threshold: 0.72,
            promote_emotion_threshold: 0.65,
            promotion_mode: PromotionMode::Either,
            relevant_limit: 8,
        }
    }
}

impl MemoryConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stm_max_entries == 0 {
            return Err(ConfigError::out_of_range("memory.stm_max_entries", "must be >= 1"));
        }
        if self.stm_trim_batch == 0 || self.stm_trim_batch > self.stm_max_entries {
            return Err(ConfigError::out_of_range(
                "memory.stm_trim_batch",
                format!("must be in 1..={}", self.stm_max_entries),
            ));
        }
        check_unit(
            "memory.promote_importance_threshold",
            self.promote_importance_threshold,
        )?;
        check_unit("memory.promote_emotion_threshold", self.promote_emotion_threshold)?;
        if self.relevant_limit == 0 {
            return Err(ConfigError::out_of_range("memory.relevant_limit", "must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub drain_min: f32,
    pub drain_max: f32,
    /// Dream cycle fires at or below this level.
    pub safety_threshold: f32,
    pub hallucination_energy_cutoff: f32,
    pub hallucination_probability: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            drain_min: 8.0,
            drain_max: 15.0,
            safety_threshold: 35.0,
            hallucination_energy_cutoff: 60.0,
            hallucination_probability: 0.10,
        }
    }
}

impl EnergyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.drain_min >= 0.0 && self.drain_min <= self.drain_max) {
            return Err(ConfigError::out_of_range(
                "energy.drain_min",
                format!("need 0 <= drain_min <= drain_max, got {} / {}", self.drain_min, self.drain_max),
            ));
        }
        if !(0.0..100.0).contains(&self.safety_threshold) {
            return Err(ConfigError::out_of_range(
                "energy.safety_threshold",
                "must be in [0, 100)",
            ));
        }
        if !(0.0..=100.0).contains(&self.hallucination_energy_cutoff) {
            return Err(ConfigError::out_of_range(
                "energy.hallucination_energy_cutoff",
                "must be in [0, 100]",
            ));
        }
        check_unit("energy.hallucination_probability", self.hallucination_probability)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurfacingConfig {
    pub slip_probability: f32,
    pub slip_window: usize,
    pub replicate_every_n_turns: u32,
    pub replicate_window: usize,
    pub replicate_max: usize,
}

impl Default for SurfacingConfig {
    fn default() -> Self {
        Self {
            slip_probability: 0.15,
            slip_window: 30,
            replicate_every_n_turns: 10,
            replicate_window: 50,
            replicate_max: 3,
        }
    }
}

impl SurfacingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_unit("surfacing.slip_probability", self.slip_probability)?;
        if self.replicate_every_n_turns == 0 {
            return Err(ConfigError::out_of_range(
                "surfacing.replicate_every_n_turns",
                "must be >= 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueMode {
    Simple,
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub max_turns: u32,
    pub mode: DialogueMode,
    pub topic_rotate_every: u32,
    pub dream_every_n_turns: u32,
    pub observer_enabled: bool,
    pub show_pronoun: bool,
    pub max_response_words: usize,
    /// Character budget for prompt assembly.
    pub context_budget_chars: usize,
    pub rng_seed: Option<u64>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_turns: 200,
            mode: DialogueMode::Dynamic,
            topic_rotate_every: 2,
            dream_every_n_turns: 7,
            observer_enabled: true,
            show_pronoun: false,
            max_response_words: 150,
            context_budget_chars: 6000,
            rng_seed: None,
        }
    }
}

impl DialogueConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::out_of_range("dialogue.max_turns", "must be >= 1"));
        }
        if self.topic_rotate_every == 0 {
            return Err(ConfigError::out_of_range(
                "dialogue.topic_rotate_every",
                "must be >= 1",
            ));
        }
        if self.max_response_words < 20 {
            return Err(ConfigError::out_of_range(
                "dialogue.max_response_words",
                "must be >= 20",
            ));
        }
        if self.context_budget_chars < 500 {
            return Err(ConfigError::out_of_range(
                "dialogue.context_budget_chars",
                "must be >= 500",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
