//! Drive/Energy dynamics: the per-turn update rules.
//!
//! Applied once per completed turn, in this order:
//! 1. measure `pre_conflict` on the drives as they were before the turn
//! 2. drain energy (random base + conflict term, capped)
//! 3. erode ego when `pre_conflict` is high
//! 4. nudge drives according to the response kind and tagged emotion
//!
//! Temperature is derived from the drives, never configured per call.

use entelgia_core::config::EnergyConfig;
use entelgia_core::state::{AgentState, DriveVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const TEMPERATURE_MIN: f32 = 0.25;
pub const TEMPERATURE_MAX: f32 = 0.95;

/// Superego level at which the governor pass runs.
pub const GOVERNOR_THRESHOLD: f32 = 7.5;
pub const GOVERNOR_TEMPERATURE: f32 = 0.25;

const CONFLICT_DRAIN_FACTOR: f32 = 0.4;
const EROSION_ONSET: f32 = 4.0;
const EROSION_RATE: f32 = 0.03;
const AGGRESSIVE_IMBALANCE: f32 = 8.5;

/// How the agent's last response is read back into its drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Aggressive,
    Guilt,
    Reflective,
}

impl ResponseKind {
    pub fn classify(emotion: &str, drives: &DriveVector) -> Self {
        if matches!(emotion, "anger" | "frustration") || drives.imbalance() >= AGGRESSIVE_IMBALANCE
        {
            ResponseKind::Aggressive
        } else if matches!(emotion, "fear" | "anxiety") {
            ResponseKind::Guilt
        } else {
            ResponseKind::Reflective
        }
    }
}

/// What one energy step did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyStep {
    pub pre_conflict: f32,
    pub drain: f32,
    pub ego_erosion: f32,
}

#[derive(Debug, Clone)]
pub struct DriveDynamics {
    drain_min: f32,
    drain_max: f32,
}

impl Default for DriveDynamics {
    fn default() -> Self {
        Self::from_config(&EnergyConfig::default())
    }
}

impl DriveDynamics {
    pub fn from_config(cfg: &EnergyConfig) -> Self {
        Self {
            drain_min: cfg.drain_min,
            drain_max: cfg.drain_max,
        }
    }

    /// Energy cost of one turn: `uniform(min, max) + 0.4 * pre_conflict`,
    /// never more than `2 * max`.
    pub fn drain<R: Rng + ?Sized>(&self, pre_conflict: f32, rng: &mut R) -> f32 {
        let base = if self.drain_max > self.drain_min {
            rng.gen_range(self.drain_min..=self.drain_max)
        } else {
            self.drain_min
        };
        (base + CONFLICT_DRAIN_FACTOR * pre_conflict.max(0.0)).min(2.0 * self.drain_max)
    }

    /// Drain energy and erode ego. Drives must not have been updated yet this turn.
    ///
    /// `pre_conflict` is the full pairwise spread `|id-ego| + |superego-ego| +
    /// |id-superego|`, not the two-term [`DriveVector::imbalance`], so id 8,
    /// ego 4, superego 4 gives 8 rather than 4.
    pub fn apply_energy<R: Rng + ?Sized>(&self, state: &mut AgentState, rng: &mut R) -> EnergyStep {
        let pre_conflict = state.drives.pairwise_spread();
        let drain = self.drain(pre_conflict, rng);
        state.energy = (state.energy - drain).max(0.0);
        let ego_erosion = erode_ego(&mut state.drives, pre_conflict);
        EnergyStep {
            pre_conflict,
            drain,
            ego_erosion,
        }
    }
}

/// Proportional ego erosion above the onset. Returns the amount removed.
pub fn erode_ego(drives: &mut DriveVector, pre_conflict: f32) -> f32 {
    if pre_conflict <= EROSION_ONSET {
        return 0.0;
    }
    let before = drives.ego;
    drives.ego = (drives.ego - EROSION_RATE * (pre_conflict - EROSION_ONSET)).max(0.0);
    before - drives.ego
}

/// Post-turn drive update.
pub fn update_drives(state: &mut AgentState, kind: ResponseKind, emotion: &str, intensity: f32) {
    let intensity = intensity.clamp(0.0, 1.0);
    let d = &mut state.drives;
    let mut sa = state.self_awareness;

    d.ego += 0.05;
    sa += 0.01;

    match kind {
        ResponseKind::Aggressive => {
            d.id += 0.18 + 0.10 * intensity;
            d.superego -= 0.08;
            d.ego -= 0.06;
        }
        ResponseKind::Guilt => {
            d.superego += 0.20 + 0.10 * intensity;
            d.id -= 0.08;
            sa += 0.03;
        }
        ResponseKind::Reflective => {
            d.superego += 0.08 + 0.05 * intensity;
            d.id -= 0.06;
            d.ego += 0.06;
            sa += 0.02;
        }
    }

    match emotion {
        "anger" | "frustration" => d.id += 0.10,
        "fear" | "anxiety" => d.superego += 0.08,
        _ => {}
    }

    state.self_awareness = sa;
    state.normalize();
}

/// Completion temperature derived from the drives.
pub fn temperature(drives: &DriveVector) -> f32 {
    let t = 0.60 + 0.03 * (drives.id - drives.ego) - 0.02 * (drives.superego - drives.ego)
        + 0.015 * drives.conflict_index();
    t.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX)
}

pub fn needs_governor(drives: &DriveVector) -> bool {
    drives.superego >= GOVERNOR_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_scenario_high_id() {
        let mut state = AgentState::default();
        state.drives = DriveVector::new(8.0, 4.0, 4.0);
        assert!(temperature(&state.drives) > 0.94);

        let mut rng = StdRng::seed_from_u64(7);
        let step = DriveDynamics::default().apply_energy(&mut state, &mut rng);
        assert_eq!(step.pre_conflict, 8.0);
        assert_eq!(DriveVector::new(8.0, 4.0, 4.0).imbalance(), 4.0);
        assert!((step.ego_erosion - 0.12).abs() < 1e-5);
        assert!((state.drives.ego - 3.88).abs() < 1e-5);
        assert!(step.drain >= 8.0 + 3.2 && step.drain <= 15.0 + 3.2);
    }

    #[test]
    fn test_drain_capped_and_energy_floor() {
        let dynamics = DriveDynamics::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(dynamics.drain(40.0, &mut rng) <= 30.0);
        }
        let mut state = AgentState::default();
        state.energy = 3.0;
        dynamics.apply_energy(&mut state, &mut rng);
        assert_eq!(state.energy, 0.0);
    }

    #[test]
    fn test_no_erosion_below_onset() {
        let mut d = DriveVector::new(6.0, 5.0, 5.0);
        let spread = d.pairwise_spread();
        assert_eq!(erode_ego(&mut d, spread), 0.0);
        assert_eq!(d.ego, 5.0);
    }

    #[test]
    fn test_erosion_never_negative() {
        let mut d = DriveVector::new(10.0, 0.1, 0.0);
        erode_ego(&mut d, 20.0);
        assert_eq!(d.ego, 0.0);
    }

    #[test]
    fn test_response_kind() {
        let calm = DriveVector::default();
        assert_eq!(ResponseKind::classify("anger", &calm), ResponseKind::Aggressive);
        assert_eq!(ResponseKind::classify("anxiety", &calm), ResponseKind::Guilt);
        assert_eq!(ResponseKind::classify("joy", &calm), ResponseKind::Reflective);
        let torn = DriveVector::new(10.0, 1.0, 1.0);
        assert_eq!(ResponseKind::classify("joy", &torn), ResponseKind::Aggressive);
    }

    #[test]
    fn test_update_drives_reflective() {
        let mut s = AgentState::default();
        update_drives(&mut s, ResponseKind::Reflective, "neutral", 0.0);
        assert!((s.drives.ego - 5.11).abs() < 1e-5);
        assert!((s.drives.superego - 5.08).abs() < 1e-5);
        assert!((s.drives.id - 4.94).abs() < 1e-5);
        assert!((s.self_awareness - 0.58).abs() < 1e-5);
    }

    #[test]
    fn test_update_drives_aggressive_with_anger() {
        let mut s = AgentState::default();
        update_drives(&mut s, ResponseKind::Aggressive, "anger", 1.0);
        assert!((s.drives.id - 5.38).abs() < 1e-5);
        assert!((s.drives.superego - 4.92).abs() < 1e-5);
        assert!((s.drives.ego - 4.99).abs() < 1e-5);
    }

    #[test]
    fn test_update_drives_clamped() {
        let mut s = AgentState::default();
        s.drives = DriveVector::new(10.0, 10.0, 0.0);
        s.self_awareness = 1.0;
        update_drives(&mut s, ResponseKind::Aggressive, "anger", 1.0);
        assert_eq!(s.drives.id, 10.0);
        assert_eq!(s.drives.superego, 0.0);
        assert_eq!(s.self_awareness, 1.0);
    }

    #[test]
    fn test_temperature_bounds_and_direction() {
        assert!((temperature(&DriveVector::default()) - 0.60).abs() < 1e-5);
        let ruled = DriveVector::new(2.0, 5.0, 9.0);
        assert!(temperature(&ruled) >= TEMPERATURE_MIN);
        assert!(needs_governor(&ruled));
        assert!(!needs_governor(&DriveVector::default()));
    }
}
