//! Output post-processing for agent responses.
//!
//! Steps run in a fixed order: sanitize, strip echoed headers, drop meta
//! phrases, enforce the dissent marker, apply pressure directives, apply the
//! global word cap. Every cut lands on a sentence boundary.

use entelgia_core::state::AgentState;
use entelgia_core::text::{sentences, trim_to_word_limit};
use entelgia_limbic::PressureDirective;
use regex::Regex;
use std::sync::LazyLock;

/// Meta-commentary the model tends to leak from its own prompt.
pub const FORBIDDEN_PHRASES: &[&str] = &[
    "as an ai",
    "as a language model",
    "in this dialogue",
    "in our dialogue",
    "in this conversation",
    "here is my response",
    "here's my response",
    "let me respond",
    "i will now respond",
    "my response is",
    "respond now",
    "recent dialogue",
];

const DISSENT_MIN: f32 = 3.0;
const QUESTIONER_IMBALANCE: f32 = 5.0;

/// Ending of a binary dilemma after the three-way rewrite.
pub const THREE_WAY_TAIL: &str = "accept it, resist it, or transcend it?";

static RE_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());
static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static RE_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static RE_SUPEREGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*superego\s*:\s*").unwrap());
static RE_FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FORBIDDEN_PHRASES
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b\s*[,:]?\s*", alternation)).unwrap()
});
static RE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(however|yet)\b[\s,]*").unwrap());
static RE_OR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+or\s+").unwrap());
static RE_EITHER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^either\s+").unwrap());

// ============================================================================
// Persona rules
// ============================================================================

/// Rhetorical obligation attached to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorRule {
    None,
    /// Under tension, end with a single binary A-or-B question.
    Questioner,
    /// When dissent runs high, include exactly one "However,"/"Yet," sentence.
    Dissenter,
}

impl BehaviorRule {
    /// Instruction for the prompt, if the rule is active for this state.
    pub fn prompt_line(&self, state: &AgentState) -> Option<&'static str> {
        match self {
            BehaviorRule::Questioner if state.drives.imbalance() >= QUESTIONER_IMBALANCE => Some(
                "End your response with exactly one binary question offering two options: A or B.",
            ),
            BehaviorRule::Dissenter if state.drives.debate_profile().dissent >= DISSENT_MIN => Some(
                "Include exactly one sentence that begins with \"However,\" or \"Yet,\".",
            ),
            _ => None,
        }
    }

    fn enforces_dissent(&self, state: &AgentState) -> bool {
        *self == BehaviorRule::Dissenter && state.drives.debate_profile().dissent >= DISSENT_MIN
    }
}

// ============================================================================
// Individual steps
// ============================================================================

/// Remove control characters and markdown bold, collapse newlines.
pub fn sanitize(text: &str) -> String {
    let s = RE_CONTROL.replace_all(text, "");
    let s = RE_BOLD.replace_all(&s, "$1");
    let s = RE_NEWLINES.replace_all(&s, " ");
    let s = RE_SPACES.replace_all(&s, " ");
    s.trim().to_string()
}

/// Strip a leading `Name:` / `Name (pronoun):` the model echoed from its
/// prompt, then a `Superego:` prefix.
pub fn strip_headers(text: &str, name: &str) -> String {
    let pattern = format!(r"(?i)^\s*\**{}\**(?:\s*\([^)]*\))?\s*:\s*", regex::escape(name));
    let stripped = match Regex::new(&pattern) {
        Ok(re) => re.replace(text, "").into_owned(),
        Err(_) => text.to_string(),
    };
    RE_SUPEREGO.replace(&stripped, "").trim().to_string()
}

pub fn remove_forbidden_phrases(text: &str) -> String {
    let removed = RE_FORBIDDEN.replace_all(text, "");
    let tidy = RE_SPACES.replace_all(removed.trim(), " ");
    capitalize(tidy.trim_start_matches(|c: char| c == ',' || c == ':' || c.is_whitespace()))
}

/// The canonical marker a sentence opens with, and the text after it.
/// Any casing counts and the comma is optional. A sentence that is nothing
/// but the marker word is not an opener.
fn split_marker(sentence: &str) -> Option<(&'static str, &str)> {
    let caps = RE_MARKER.captures(sentence)?;
    let whole = caps.get(0)?;
    let rest = &sentence[whole.end()..];
    if !rest.chars().any(char::is_alphanumeric) {
        return None;
    }
    let marker = if caps[1].eq_ignore_ascii_case("however") { "However" } else { "Yet" };
    Some((marker, rest))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first letter unless the first word is "I" or an acronym.
fn decapitalize(s: &str) -> String {
    let first_word = s.split_whitespace().next().unwrap_or("");
    let keep = first_word == "I"
        || first_word.starts_with("I'")
        || first_word.chars().nth(1).map_or(false, char::is_uppercase);
    if keep {
        return s.to_string();
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Exactly one sentence opens with a dissent marker. The first opener found
/// (any case, comma optional) is normalised to "However,"/"Yet,", later ones
/// are dropped, and if none exists the last sentence gains "However,".
pub fn enforce_dissent_marker(text: &str) -> String {
    let mut parts = sentences(text);
    if parts.is_empty() {
        return text.to_string();
    }
    let mut seen = false;
    for part in parts.iter_mut() {
        let Some((marker, rest)) = split_marker(part) else {
            continue;
        };
        if seen {
            let mut rest = rest.to_string();
            while let Some((_, inner)) = split_marker(&rest) {
                rest = inner.to_string();
            }
            *part = capitalize(&rest);
        } else {
            *part = format!("{}, {}", marker, decapitalize(rest));
            seen = true;
        }
    }
    if !seen {
        if let Some(last) = parts.last_mut() {
            *last = format!("However, {}", decapitalize(last));
        }
    }
    parts.join(" ")
}

/// Rewrite "X or Y?" questions into a three-way choice.
pub fn rewrite_binary_dilemmas(text: &str) -> String {
    sentences(text)
        .into_iter()
        .map(|s| {
            if !s.ends_with('?') || s.contains(THREE_WAY_TAIL) {
                return s;
            }
            let Some(m) = RE_OR.find(&s) else {
                return s;
            };
            let stem = s[..m.start()]
                .trim_end_matches(|c: char| c == ',' || c == ':' || c == ';' || c.is_whitespace());
            let stem = RE_EITHER.replace(stem, "");
            if stem.trim().is_empty() {
                return s;
            }
            format!("{}: {}", capitalize(stem.trim()), THREE_WAY_TAIL)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Pipeline
// ============================================================================

/// Everything post-processing needs to know about the speaker.
#[derive(Debug, Clone, Copy)]
pub struct PostContext<'a> {
    pub name: &'a str,
    pub rule: BehaviorRule,
    pub state: &'a AgentState,
    pub directive: PressureDirective,
    pub max_words: usize,
}

pub fn postprocess(raw: &str, ctx: &PostContext<'_>) -> String {
    let mut text = sanitize(raw);
    text = strip_headers(&text, ctx.name);
    text = remove_forbidden_phrases(&text);
    if text.is_empty() {
        return text;
    }
    if ctx.rule.enforces_dissent(ctx.state) {
        text = enforce_dissent_marker(&text);
    }
    if ctx.directive.three_way {
        text = rewrite_binary_dilemmas(&text);
    }
    if let Some(cap) = ctx.directive.word_cap() {
        text = trim_to_word_limit(&text, cap);
    }
    trim_to_word_limit(&text, ctx.max_words)
}
