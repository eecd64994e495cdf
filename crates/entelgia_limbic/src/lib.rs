//! # Entelgia Limbic
//!
//! Per-agent regulation that runs synchronously on turn boundaries:
//!
//! - **Dynamics**: energy drain, ego erosion, drive update, derived temperature
//! - **Pressure**: smoothed urgency with stagnation and open-question tracking
//! - **Regulator**: dream trigger and advisory hallucination risk
//!
//! Nothing here runs on a timer; every function is driven by the turn loop,
//! and every random draw takes the caller's RNG.

pub mod dynamics;
pub mod pressure;
mod regulator;

pub use dynamics::{
    erode_ego, needs_governor, temperature, update_drives, DriveDynamics, EnergyStep,
    ResponseKind, GOVERNOR_TEMPERATURE,
};
pub use pressure::{
    compute_drive_pressure, is_question_resolved, topic_signature, update_open_questions,
    PressureDirective, PressureInputs, PressureLevel, TopicTracker,
};
pub use regulator::{EnergyRegulator, RegulatorSignal};
