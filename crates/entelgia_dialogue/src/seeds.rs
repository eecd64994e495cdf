//! Rhetorical seed selection.

use entelgia_core::SeedStrategy;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;

const META_EVERY: u32 = 7;
const STAGNATION_BREAK: f32 = 0.66;
const SYNTHESIS_IMBALANCE: f32 = 8.0;

/// Relative weights for the unconstrained pick, in percent.
const WEIGHTS: [(SeedStrategy, u32); 7] = [
    (SeedStrategy::AgreeAndExpand, 15),
    (SeedStrategy::QuestionAssumption, 20),
    (SeedStrategy::Synthesize, 10),
    (SeedStrategy::ConstructiveDisagree, 25),
    (SeedStrategy::ExploreImplication, 15),
    (SeedStrategy::IntroduceAnalogy, 10),
    (SeedStrategy::MetaReflect, 5),
];

/// Dialogue state the selector reacts to.
#[derive(Debug, Clone, Copy)]
pub struct SeedContext<'a> {
    /// 1-based number of the agent turn being produced.
    pub turn: u32,
    pub stagnation: f32,
    /// Speaker's raw drive imbalance.
    pub imbalance: f32,
    /// Emotion tagged on the previous agent turn.
    pub last_emotion: Option<&'a str>,
    /// Strategy used on the previous agent turn.
    pub previous: Option<SeedStrategy>,
}

pub fn select_seed(ctx: &SeedContext<'_>, rng: &mut StdRng) -> SeedStrategy {
    let picked = pick(ctx, rng);
    if Some(picked) == ctx.previous {
        picked.next()
    } else {
        picked
    }
}

fn pick(ctx: &SeedContext<'_>, rng: &mut StdRng) -> SeedStrategy {
    if ctx.previous.is_none() && ctx.last_emotion.is_none() {
        return SeedStrategy::ConstructiveDisagree;
    }
    if ctx.turn > 0 && ctx.turn % META_EVERY == 0 {
        return SeedStrategy::MetaReflect;
    }
    if ctx.stagnation >= STAGNATION_BREAK {
        return if rng.gen_bool(0.5) {
            SeedStrategy::QuestionAssumption
        } else {
            SeedStrategy::IntroduceAnalogy
        };
    }
    if ctx.imbalance > SYNTHESIS_IMBALANCE {
        return SeedStrategy::Synthesize;
    }
    if matches!(ctx.last_emotion, Some("anger") | Some("frustration")) {
        return SeedStrategy::AgreeAndExpand;
    }
    weighted(rng)
}

fn weighted(rng: &mut StdRng) -> SeedStrategy {
    match WeightedIndex::new(WEIGHTS.iter().map(|(_, w)| *w)) {
        Ok(dist) => WEIGHTS[dist.sample(rng)].0,
        Err(_) => SeedStrategy::ConstructiveDisagree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ctx(turn: u32) -> SeedContext<'static> {
        SeedContext {
            turn,
            stagnation: 0.0,
            imbalance: 0.0,
            last_emotion: Some("neutral"),
            previous: Some(SeedStrategy::ExploreImplication),
        }
    }

    #[test]
    fn test_opening_turn_disagrees() {
        let mut rng = StdRng::seed_from_u64(0);
        let c = SeedContext {
            last_emotion: None,
            previous: None,
            ..ctx(1)
        };
        assert_eq!(select_seed(&c, &mut rng), SeedStrategy::ConstructiveDisagree);
    }

    #[test]
    fn test_rule_priority() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(select_seed(&ctx(14), &mut rng), SeedStrategy::MetaReflect);

        let stagnant = SeedContext { stagnation: 1.0, ..ctx(3) };
        let s = select_seed(&stagnant, &mut rng);
        assert!(matches!(
            s,
            SeedStrategy::QuestionAssumption | SeedStrategy::IntroduceAnalogy
        ));

        let tense = SeedContext { imbalance: 9.0, ..ctx(3) };
        assert_eq!(select_seed(&tense, &mut rng), SeedStrategy::Synthesize);

        let angry = SeedContext { last_emotion: Some("anger"), ..ctx(3) };
        assert_eq!(select_seed(&angry, &mut rng), SeedStrategy::AgreeAndExpand);
    }

    #[test]
    fn test_never_repeats_previous() {
        let mut rng = StdRng::seed_from_u64(0);
        let c = SeedContext {
            previous: Some(SeedStrategy::MetaReflect),
            ..ctx(7)
        };
        assert_eq!(select_seed(&c, &mut rng), SeedStrategy::Synthesize);

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let c = SeedContext {
                previous: Some(SeedStrategy::ConstructiveDisagree),
                ..ctx(3)
            };
            assert_ne!(select_seed(&c, &mut rng), SeedStrategy::ConstructiveDisagree);
        }
    }
}
