//! Per-agent regulation state.
//!
//! The drive vector models impulse (`id`), regulation (`ego`) and constraint
//! (`superego`). Energy, pressure and self-awareness sit alongside it and
//! are mutated once per completed turn by the owning agent only.

use serde::{Deserialize, Serialize};

pub const DRIVE_MIN: f32 = 0.0;
pub const DRIVE_MAX: f32 = 10.0;
pub const ENERGY_MAX: f32 = 100.0;
pub const PRESSURE_MAX: f32 = 10.0;

/// Upper bound of [`DriveVector::conflict_index`].
pub const CONFLICT_INDEX_MAX: f32 = 20.0;
/// Scale of the saturation curve; an imbalance of 4 reads as ~80% of max.
const CONFLICT_SATURATION: f32 = 2.5;

const BASELINE_DRIVE: f32 = 5.0;
const BASELINE_SELF_AWARENESS: f32 = 0.55;
const BASELINE_PRESSURE: f32 = 2.0;

/// Guard against NaN and Infinity in state values.
/// If the value is NaN or Inf, replace with the provided fallback (baseline).
#[inline]
pub fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in state, resetting to fallback {}", fallback);
        fallback
    }
}

/// Which drive currently dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Drive {
    Id,
    Ego,
    Superego,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveVector {
    pub id: f32,
    pub ego: f32,
    pub superego: f32,
}

impl Default for DriveVector {
    fn default() -> Self {
        Self {
            id: BASELINE_DRIVE,
            ego: BASELINE_DRIVE,
            superego: BASELINE_DRIVE,
        }
    }
}

impl DriveVector {
    pub fn new(id: f32, ego: f32, superego: f32) -> Self {
        let mut v = Self { id, ego, superego };
        v.normalize();
        v
    }

    /// `|id - ego| + |superego - ego|`, in [0, 20].
    pub fn imbalance(&self) -> f32 {
        (self.id - self.ego).abs() + (self.superego - self.ego).abs()
    }

    /// Full pairwise spread, also counting the id/superego axis.
    /// Drain and ego erosion are driven by this value, measured pre-turn.
    pub fn pairwise_spread(&self) -> f32 {
        self.imbalance() + (self.id - self.superego).abs()
    }

    /// Saturating conflict measure: 0 at balance, strictly increasing in
    /// [`imbalance`](Self::imbalance), approaching [`CONFLICT_INDEX_MAX`].
    pub fn conflict_index(&self) -> f32 {
        CONFLICT_INDEX_MAX * (1.0 - (-self.imbalance() / CONFLICT_SATURATION).exp())
    }

    /// Ties resolve to ego, then id before superego.
    pub fn dominant(&self) -> Drive {
        if self.id > self.ego && self.id > self.superego {
            Drive::Id
        } else if self.superego > self.ego && self.superego > self.id {
            Drive::Superego
        } else {
            Drive::Ego
        }
    }

    pub fn debate_profile(&self) -> DebateProfile {
        let dissent = (self.id * 0.45 + self.superego * 0.45 - self.ego * 0.25).clamp(0.0, 10.0);
        let style = if self.id >= self.superego && self.id >= self.ego {
            DebateStyle::Provocative
        } else if self.superego >= self.id && self.superego >= self.ego {
            DebateStyle::Principled
        } else {
            DebateStyle::Integrative
        };
        DebateProfile { dissent, style }
    }

    /// Clamp all drives to [0, 10].
    pub fn normalize(&mut self) {
        self.id = sanitize_f32(self.id, BASELINE_DRIVE).clamp(DRIVE_MIN, DRIVE_MAX);
        self.ego = sanitize_f32(self.ego, BASELINE_DRIVE).clamp(DRIVE_MIN, DRIVE_MAX);
        self.superego = sanitize_f32(self.superego, BASELINE_DRIVE).clamp(DRIVE_MIN, DRIVE_MAX);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStyle {
    Provocative,
    Principled,
    Integrative,
}

impl DebateStyle {
    pub fn label(&self) -> &'static str {
        match self {
            DebateStyle::Provocative => "provocative, desire-driven",
            DebateStyle::Principled => "principled, rule-focused",
            DebateStyle::Integrative => "integrative, Socratic",
        }
    }

    pub fn opening_rule(&self) -> &'static str {
        match self {
            DebateStyle::Provocative => "Bold counterpoint. Push forward.",
            DebateStyle::Principled => "Principled objection or logical inconsistency.",
            DebateStyle::Integrative => "Precise counterpoint, then synthesis.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebateProfile {
    /// 0-10, how strongly the agent should push back.
    pub dissent: f32,
    pub style: DebateStyle,
}

/// Complete regulation state of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub drives: DriveVector,
    /// 0-100
    pub energy: f32,
    /// 0-10, smoothed
    pub pressure: f32,
    /// 0-1
    pub self_awareness: f32,
    /// Questions raised and not yet answered.
    pub open_questions: u32,
    /// Last governor critique. Internal bookkeeping only, never dialogue text.
    #[serde(default)]
    pub governor_audit: Option<String>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            drives: DriveVector::default(),
            energy: ENERGY_MAX,
            pressure: BASELINE_PRESSURE,
            self_awareness: BASELINE_SELF_AWARENESS,
            open_questions: 0,
            governor_audit: None,
        }
    }
}

impl AgentState {
    /// Clamp all values to valid ranges
    pub fn normalize(&mut self) {
        self.drives.normalize();
        self.energy = sanitize_f32(self.energy, ENERGY_MAX).clamp(0.0, ENERGY_MAX);
        self.pressure = sanitize_f32(self.pressure, BASELINE_PRESSURE).clamp(0.0, PRESSURE_MAX);
        self.self_awareness =
            sanitize_f32(self.self_awareness, BASELINE_SELF_AWARENESS).clamp(0.0, 1.0);
    }

    pub fn conflict_index(&self) -> f32 {
        self.drives.conflict_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_has_zero_conflict() {
        let v = DriveVector::default();
        assert_eq!(v.imbalance(), 0.0);
        assert_eq!(v.conflict_index(), 0.0);
        assert_eq!(v.dominant(), Drive::Ego);
    }

    #[test]
    fn test_conflict_index_symmetric() {
        let up = DriveVector::new(7.0, 5.0, 5.0);
        let down = DriveVector::new(3.0, 5.0, 5.0);
        assert!((up.conflict_index() - down.conflict_index()).abs() < 1e-6);
    }

    #[test]
    fn test_extreme_imbalance_near_max() {
        let v = DriveVector::new(8.0, 4.0, 4.0);
        assert_eq!(v.pairwise_spread(), 8.0);
        assert!(v.conflict_index() > 0.75 * CONFLICT_INDEX_MAX);
        let extreme = DriveVector::new(10.0, 0.0, 10.0);
        assert!(extreme.conflict_index() > 0.99 * CONFLICT_INDEX_MAX);
        assert!(extreme.conflict_index() <= CONFLICT_INDEX_MAX);
    }

    #[test]
    fn test_debate_profile_styles() {
        let p = DriveVector::new(8.0, 4.0, 4.0).debate_profile();
        assert_eq!(p.style, DebateStyle::Provocative);
        let p = DriveVector::new(3.0, 4.0, 8.0).debate_profile();
        assert_eq!(p.style, DebateStyle::Principled);
        assert!((p.dissent - (3.0 * 0.45 + 8.0 * 0.45 - 4.0 * 0.25)).abs() < 1e-5);
        let p = DriveVector::new(3.0, 8.0, 3.0).debate_profile();
        assert_eq!(p.style, DebateStyle::Integrative);
    }

    #[test]
    fn test_normalize_clamps_and_sanitizes() {
        let mut s = AgentState::default();
        s.drives.id = 14.0;
        s.drives.ego = f32::NAN;
        s.energy = -3.0;
        s.pressure = 12.0;
        s.self_awareness = f32::INFINITY;
        s.normalize();
        assert_eq!(s.drives.id, 10.0);
        assert_eq!(s.drives.ego, 5.0);
        assert_eq!(s.energy, 0.0);
        assert_eq!(s.pressure, 10.0);
        assert_eq!(s.self_awareness, 0.55);
    }
}
