//! Text helpers shared by the memory and dialogue crates.

use std::collections::BTreeSet;

/// Lowercase alphabetic words with more than `min_exclusive` characters.
pub fn keywords(text: &str, min_exclusive: usize) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > min_exclusive && w.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of two sets. Two empty sets score 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    inter / union
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split into sentences, keeping terminal punctuation.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // swallow runs like "?!" or "..."
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let at_boundary = chars.peek().map_or(true, |n| n.is_whitespace());
            if at_boundary {
                let s = current.trim();
                if !s.is_empty() {
                    out.push(s.to_string());
                }
                current.clear();
            }
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Trim `text` to at most `limit` words, ending at a sentence boundary.
///
/// Whole sentences are kept while they fit. If even the first sentence is
/// too long, its first `limit` words are returned with a closing period so
/// the result still reads as a complete sentence.
pub fn trim_to_word_limit(text: &str, limit: usize) -> String {
    let text = text.trim();
    if word_count(text) <= limit {
        return text.to_string();
    }
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0;
    for sentence in sentences(text) {
        let n = word_count(&sentence);
        if used + n > limit {
            break;
        }
        used += n;
        kept.push(sentence);
    }
    if !kept.is_empty() {
        return kept.join(" ");
    }
    let words: Vec<&str> = text.split_whitespace().take(limit).collect();
    let mut cut = words.join(" ");
    while cut.ends_with(|c: char| c == ',' || c == ';' || c == ':' || c == '-') {
        cut.pop();
    }
    if !cut.ends_with(|c: char| matches!(c, '.' | '!' | '?')) {
        cut.push('.');
    }
    cut
}

/// Truncate to `max_chars`, backing off to a word boundary and appending `...`.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => head[..pos].trim_end().to_string(),
        _ => head,
    };
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_filters_short_and_numeric() {
        let k = keywords("The mind, the Memory and 2024 data!", 3);
        assert!(k.contains("mind"));
        assert!(k.contains("memory"));
        assert!(k.contains("data"));
        assert!(!k.contains("the"));
        assert!(!k.contains("2024"));
    }

    #[test]
    fn test_jaccard() {
        let a = keywords("truth beauty goodness", 3);
        let b = keywords("truth beauty justice", 3);
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-6);
        assert_eq!(jaccard(&a, &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_sentences() {
        let s = sentences("First point. Second?! Third... and e.g.fourth");
        assert_eq!(s.len(), 4);
        assert_eq!(s[1], "Second?!");
        assert_eq!(s[3], "and e.g.fourth");
    }

    #[test]
    fn test_trim_keeps_whole_sentences() {
        let text = "One two three. Four five six. Seven eight nine ten.";
        assert_eq!(trim_to_word_limit(text, 7), "One two three. Four five six.");
        assert_eq!(trim_to_word_limit(text, 100), text);
    }

    #[test]
    fn test_trim_single_long_sentence() {
        let text = "alpha beta gamma delta, epsilon zeta";
        assert_eq!(trim_to_word_limit(text, 4), "alpha beta gamma delta.");
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short", 10), "short");
        assert_eq!(truncate_at_word("hello wonderful world", 12), "hello...");
    }
}
