//! Property-based tests for the signature layer and drive state.

use entelgia_core::signature::{sign_message, verify_message};
use entelgia_core::{AgentState, DriveVector};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_drive() -> impl Strategy<Value = f32> {
    0.0f32..=10.0
}

fn arb_drives() -> impl Strategy<Value = DriveVector> {
    (arb_drive(), arb_drive(), arb_drive()).prop_map(|(i, e, s)| DriveVector::new(i, e, s))
}

// ============================================================================
// Signature properties
// ============================================================================

proptest! {
    #[test]
    fn sign_then_verify_holds(
        msg in prop::collection::vec(any::<u8>(), 1..256),
        key in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let sig = sign_message(&msg, &key).unwrap();
        prop_assert!(verify_message(&msg, &key, &sig).unwrap());
    }

    #[test]
    fn flipping_a_message_byte_breaks_verification(
        msg in prop::collection::vec(any::<u8>(), 1..256),
        key in prop::collection::vec(any::<u8>(), 1..64),
        idx in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let sig = sign_message(&msg, &key).unwrap();
        let mut tampered = msg.clone();
        let i = idx.index(tampered.len());
        tampered[i] ^= flip;
        prop_assert!(!verify_message(&tampered, &key, &sig).unwrap());
    }

    #[test]
    fn flipping_a_key_byte_breaks_verification(
        msg in prop::collection::vec(any::<u8>(), 1..256),
        key in prop::collection::vec(any::<u8>(), 1..64),
        idx in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let sig = sign_message(&msg, &key).unwrap();
        let mut other = key.clone();
        let i = idx.index(other.len());
        other[i] ^= flip;
        prop_assert!(!verify_message(&msg, &other, &sig).unwrap());
    }

    #[test]
    fn flipping_a_signature_byte_breaks_verification(
        msg in prop::collection::vec(any::<u8>(), 1..256),
        key in prop::collection::vec(any::<u8>(), 1..64),
        idx in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let sig = sign_message(&msg, &key).unwrap();
        let mut raw = hex::decode(&sig).unwrap();
        let i = idx.index(raw.len());
        raw[i] ^= flip;
        prop_assert!(!verify_message(&msg, &key, &hex::encode(raw)).unwrap());
    }

    #[test]
    fn non_canonical_signature_text_is_rejected(
        msg in prop::collection::vec(any::<u8>(), 1..256),
        key in prop::collection::vec(any::<u8>(), 1..64),
        pad in prop::sample::select(vec![" ", "\n", "\t", "  \r\n"]),
    ) {
        let sig = sign_message(&msg, &key).unwrap();
        let upper = sig.to_uppercase();
        if upper != sig {
            prop_assert!(!verify_message(&msg, &key, &upper).unwrap(), "upper-cased signature verified");
        }
        let padded_front = format!("{}{}", pad, sig);
        let padded_back = format!("{}{}", sig, pad);
        prop_assert!(!verify_message(&msg, &key, &padded_front).unwrap());
        prop_assert!(!verify_message(&msg, &key, &padded_back).unwrap());
    }
}

// ============================================================================
// Drive properties
// ============================================================================

proptest! {
    #[test]
    fn conflict_index_strictly_increasing_in_imbalance(a in arb_drives(), b in arb_drives()) {
        let (ia, ib) = (a.imbalance(), b.imbalance());
        prop_assume!((ia - ib).abs() > 0.05);
        if ia < ib {
            prop_assert!(a.conflict_index() < b.conflict_index());
        } else {
            prop_assert!(a.conflict_index() > b.conflict_index());
        }
    }

    #[test]
    fn conflict_index_zero_at_balance(x in arb_drive()) {
        let v = DriveVector::new(x, x, x);
        prop_assert_eq!(v.conflict_index(), 0.0);
    }

    #[test]
    fn conflict_index_bounded(v in arb_drives()) {
        let c = v.conflict_index();
        prop_assert!((0.0..=20.0).contains(&c));
    }

    #[test]
    fn normalize_keeps_state_in_range(
        id in -50.0f32..50.0,
        ego in -50.0f32..50.0,
        sup in -50.0f32..50.0,
        energy in -500.0f32..500.0,
        pressure in -50.0f32..50.0,
        sa in -5.0f32..5.0,
    ) {
        let mut s = AgentState::default();
        s.drives = DriveVector { id, ego, superego: sup };
        s.energy = energy;
        s.pressure = pressure;
        s.self_awareness = sa;
        s.normalize();
        prop_assert!((0.0..=10.0).contains(&s.drives.id));
        prop_assert!((0.0..=10.0).contains(&s.drives.ego));
        prop_assert!((0.0..=10.0).contains(&s.drives.superego));
        prop_assert!((0.0..=100.0).contains(&s.energy));
        prop_assert!((0.0..=10.0).contains(&s.pressure));
        prop_assert!((0.0..=1.0).contains(&s.self_awareness));
    }
}
