//! PII redaction applied before anything reaches the long-term store.

use regex::Regex;
use std::sync::LazyLock;

pub const REDACTED: &str = "[REDACTED]";

static PII_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // emails
        r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        // api keys
        r"sk-[A-Za-z0-9]{20,}",
        // card numbers, account ids
        r"\b\d{8,19}\b",
        // phone numbers
        r"(?:\+\d{1,3}[-.\s]?)?\(?\d{2,4}\)?[-.\s]\d{3,4}[-.\s]\d{3,4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "passcode",
    "api key",
    "secret",
    "token",
    "private key",
    "seed phrase",
    "credit card",
    "cvv",
];

pub fn redact_pii(text: &str) -> String {
    let mut out = text.to_string();
    for re in PII_PATTERNS.iter() {
        out = re.replace_all(&out, REDACTED).into_owned();
    }
    out
}

/// Text that names a credential or carries PII.
pub fn is_sensitive(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_KEYWORDS.iter().any(|k| lower.contains(k)) || redact_pii(text) != text
}

/// Summary stored in place of sensitive content.
pub fn sensitive_summary(topic: &str, emotion: &str, intensity: f32, importance: f32) -> String {
    format!(
        "[SENSITIVE_CONTENT_REDACTED] topic={} emotion={} intensity={:.2} importance={:.2}",
        topic, emotion, intensity, importance
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_email_and_key() {
        let out = redact_pii("Mail socrates@agora.gr with sk-abcdefghijklmnopqrstuvwx now");
        assert!(!out.contains("agora.gr"));
        assert!(!out.contains("sk-abc"));
        assert_eq!(out.matches(REDACTED).count(), 2);
    }

    #[test]
    fn test_redacts_digits_and_phone() {
        assert_eq!(redact_pii("card 4111111111111111"), "card [REDACTED]");
        assert!(redact_pii("call 555-123-4567 today").contains(REDACTED));
    }

    #[test]
    fn test_plain_text_untouched() {
        let t = "Memory is the scaffold of identity, said Athena in 399 BC.";
        assert_eq!(redact_pii(t), t);
        assert!(!is_sensitive(t));
    }

    #[test]
    fn test_sensitive_detection() {
        assert!(is_sensitive("my Password is hunter2"));
        assert!(is_sensitive("reach me at a@b.io"));
        let s = sensitive_summary("ethics", "fear", 0.8, 0.5);
        assert!(s.starts_with("[SENSITIVE_CONTENT_REDACTED]"));
        assert!(s.contains("intensity=0.80"));
    }
}
