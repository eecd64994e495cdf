//! Property-based tests for entelgia_limbic drain, pressure and temperature.
//!
//! Verifies that energy drain always respects its documented bounds, that
//! pressure never leaves [0, 10], and that sustained stagnation raises it.

use entelgia_core::{AgentState, DriveVector};
use entelgia_limbic::{
    compute_drive_pressure, temperature, DriveDynamics, PressureInputs, TopicTracker,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ============================================================================
// Strategies
// ============================================================================

fn arb_drives() -> impl Strategy<Value = DriveVector> {
    (0.0f32..=10.0, 0.0f32..=10.0, 0.0f32..=10.0).prop_map(|(i, e, s)| DriveVector::new(i, e, s))
}

fn arb_inputs() -> impl Strategy<Value = PressureInputs> {
    (0.0f32..=100.0, 0.0f32..=20.0, 0u32..=5, 0.0f32..=1.0).prop_map(
        |(energy, conflict, unresolved, stagnation)| PressureInputs {
            energy,
            conflict,
            unresolved,
            stagnation,
        },
    )
}

// ============================================================================
// Energy drain
// ============================================================================

proptest! {
    #[test]
    fn drain_within_bounds(drives in arb_drives(), energy in 0.0f32..=100.0, seed in any::<u64>()) {
        let dynamics = DriveDynamics::default();
        let mut state = AgentState { drives, energy, ..AgentState::default() };
        let mut rng = StdRng::seed_from_u64(seed);
        let step = dynamics.apply_energy(&mut state, &mut rng);

        prop_assert!(step.drain >= 8.0 - 1e-4);
        prop_assert!(step.drain <= 15.0 + 0.4 * step.pre_conflict + 1e-4);
        prop_assert!(step.drain <= 30.0 + 1e-4);
        prop_assert!(state.energy >= 0.0);
        prop_assert!(state.drives.ego >= 0.0);
    }

    #[test]
    fn temperature_in_range(drives in arb_drives()) {
        let t = temperature(&drives);
        prop_assert!((0.25..=0.95).contains(&t));
    }
}

// ============================================================================
// Pressure
// ============================================================================

proptest! {
    #[test]
    fn pressure_always_clamped(prev in -5.0f32..=15.0, inputs in arb_inputs()) {
        let p = compute_drive_pressure(prev, inputs);
        prop_assert!((0.0..=10.0).contains(&p));
    }

    #[test]
    fn pressure_sequence_stays_clamped(seq in prop::collection::vec(arb_inputs(), 1..30)) {
        let mut p = 2.0;
        for inputs in seq {
            p = compute_drive_pressure(p, inputs);
            prop_assert!((0.0..=10.0).contains(&p));
        }
    }
}

#[test]
fn stagnant_turns_raise_pressure() {
    let mut tracker = TopicTracker::new();
    let text = "Is memory the ground of identity, or identity the ground of memory?";
    let mut pressures = Vec::new();
    let mut p = 2.0;
    for _ in 0..8 {
        let stagnation = tracker.observe(text);
        p = compute_drive_pressure(
            p,
            PressureInputs {
                energy: 70.0,
                conflict: 4.0,
                unresolved: 1,
                stagnation,
            },
        );
        pressures.push(p);
    }
    assert!(pressures[7] > pressures[0]);
    assert!(pressures.windows(2).all(|w| w[1] > w[0]));
}
