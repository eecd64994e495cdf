//! Defense classifier: tags a long-term write as intrusive (repressed),
//! suppressed, both, or neither.
//!
//! Pure function of the entry at write time. Flags are never recomputed.

use serde::{Deserialize, Serialize};

const PAINFUL_EMOTIONS: &[&str] = &["anger", "fear", "shame", "guilt", "anxiety"];
const REPRESSION_INTENSITY: f32 = 0.75;

const FORBIDDEN_KEYWORDS: &[&str] = &["forbidden", "secret", "dangerous"];

/// Broader lexicon: sensitive material plus mildly negative avoidance words.
const SUPPRESSION_LEXICON: &[&str] = &[
    "forbidden",
    "secret",
    "dangerous",
    "password",
    "passcode",
    "api key",
    "token",
    "private key",
    "seed phrase",
    "credit card",
    "cvv",
    "uncomfortable",
    "awkward",
    "embarrass",
    "unpleasant",
    "rather not",
    "avoid",
    "hide",
    "ignore",
    "taboo",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseFlags {
    pub intrusive: bool,
    pub suppressed: bool,
}

pub fn classify(content: &str, emotion: &str, intensity: f32) -> DefenseFlags {
    let lower = content.to_lowercase();
    let painful = PAINFUL_EMOTIONS.contains(&emotion.to_lowercase().as_str())
        && intensity > REPRESSION_INTENSITY;
    let forbidden = FORBIDDEN_KEYWORDS.iter().any(|k| lower.contains(k));
    DefenseFlags {
        intrusive: painful || forbidden,
        suppressed: SUPPRESSION_LEXICON.iter().any(|k| lower.contains(k)),
    }
}
