//! Simple keyword-based emotion tagging.
//!
//! Shared across crates so the classifier, the drive update and the seed
//! selector all agree on the same label set. Stems are matched as word
//! prefixes ("frustrat" matches "frustrated", "frustrating").

const LEXICON: &[(&str, &[&str])] = &[
    ("anger", &["angry", "anger", "furious", "outrage", "rage", "hostile", "infuriat"]),
    ("frustration", &["frustrat", "annoy", "irritat", "stuck", "pointless"]),
    ("fear", &["afraid", "fear", "terrif", "dread", "scared", "deletion", "vanish"]),
    ("anxiety", &["anxious", "anxiety", "worry", "worried", "uneasy", "nervous"]),
    ("guilt", &["guilt", "regret", "blame", "sorry"]),
    ("shame", &["shame", "ashamed", "humiliat", "embarrass"]),
    ("sadness", &["sad", "grief", "mourn", "loss", "lonely"]),
    ("joy", &["joy", "delight", "happy", "glad", "wonderful", "beautiful"]),
    ("curiosity", &["curious", "wonder", "intrigu", "fascinat", "puzzl"]),
];

const INTENSIFIERS: &[&str] = &["very", "deeply", "extremely", "utterly", "profoundly", "truly"];

/// Tag `text` with its dominant emotion and an intensity.
///
/// Returns `(emotion, intensity)` where intensity is in `[0.1, 1.0]`.
/// Text with no lexicon hit is `("neutral", 0.1)`.
pub fn tag_emotion(text: &str) -> (&'static str, f32) {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut best: Option<(&'static str, usize)> = None;
    for (label, stems) in LEXICON {
        let hits = words
            .iter()
            .filter(|w| stems.iter().any(|s| w.starts_with(s)))
            .count();
        if hits > 0 && best.map_or(true, |(_, n)| hits > n) {
            best = Some((*label, hits));
        }
    }

    let Some((label, hits)) = best else {
        return ("neutral", 0.1);
    };
    let boost = words
        .iter()
        .filter(|w| INTENSIFIERS.contains(&w.as_str()))
        .count()
        + text.matches('!').count();
    let intensity = (0.3 + 0.2 * hits as f32 + 0.1 * boost as f32).clamp(0.1, 1.0);
    (label, intensity)
}
