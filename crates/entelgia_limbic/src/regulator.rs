//! Energy regulator: decides, once per turn, whether the agent needs a dream
//! cycle or should be warned about hallucination risk.

use entelgia_core::config::EnergyConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulatorSignal {
    Stable,
    /// Energy at or below the safety threshold. The caller must run a dream cycle.
    DreamTriggered,
    /// Advisory only: the next prompt should ask for caution.
    HallucinationRisk,
}

#[derive(Debug, Clone)]
pub struct EnergyRegulator {
    safety_threshold: f32,
    hallucination_cutoff: f32,
    hallucination_probability: f64,
}

impl Default for EnergyRegulator {
    fn default() -> Self {
        Self::from_config(&EnergyConfig::default())
    }
}

impl EnergyRegulator {
    pub fn from_config(cfg: &EnergyConfig) -> Self {
        Self {
            safety_threshold: cfg.safety_threshold,
            hallucination_cutoff: cfg.hallucination_energy_cutoff,
            hallucination_probability: cfg.hallucination_probability.clamp(0.0, 1.0) as f64,
        }
    }

    pub fn safety_threshold(&self) -> f32 {
        self.safety_threshold
    }

    /// The hallucination roll is drawn only when energy is in the risk band,
    /// so a stable agent does not consume randomness.
    pub fn check_stability<R: Rng + ?Sized>(&self, energy: f32, rng: &mut R) -> RegulatorSignal {
        if energy <= self.safety_threshold {
            tracing::info!(energy, threshold = self.safety_threshold, "Dream cycle triggered");
            return RegulatorSignal::DreamTriggered;
        }
        if energy < self.hallucination_cutoff && rng.gen_bool(self.hallucination_probability) {
            tracing::debug!(energy, "Hallucination risk flagged");
            return RegulatorSignal::HallucinationRisk;
        }
        RegulatorSignal::Stable
    }
}
