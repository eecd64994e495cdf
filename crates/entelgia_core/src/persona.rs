//! Persona interface.
//!
//! One trait covers both shapes of persona: a constant string and a rich
//! description whose "current mode" line follows the dominant drive.

use crate::state::{Drive, DriveVector};
use serde::{Deserialize, Serialize};

pub trait Persona: Send + Sync {
    fn name(&self) -> &str;

    fn pronoun(&self) -> Option<&str> {
        None
    }

    /// Persona text for the prompt, modulated by the current drives.
    fn format(&self, drives: &DriveVector) -> String;

    /// `Name:` or `Name (pronoun):` prompt header.
    fn header(&self, show_pronoun: bool) -> String {
        match (show_pronoun, self.pronoun()) {
            (true, Some(p)) => format!("{} ({}):", self.name(), p),
            _ => format!("{}:", self.name()),
        }
    }
}

/// Minimal persona: the same text regardless of drives.
#[derive(Debug, Clone)]
pub struct StaticPersona {
    name: String,
    text: String,
}

impl StaticPersona {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
        }
    }
}

impl Persona for StaticPersona {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, _drives: &DriveVector) -> String {
        self.text.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichPersona {
    pub name: String,
    pub pronoun: Option<String>,
    pub description: String,
    pub thinking_style: String,
    pub high_id: String,
    pub high_ego: String,
    pub high_superego: String,
}

impl RichPersona {
    pub fn socrates() -> Self {
        Self {
            name: "Socrates".to_string(),
            pronoun: Some("he".to_string()),
            description: "Socratic philosopher who relentlessly questions assumptions, seeks clarity \
                through dialectic method, and values truth over comfort. Speaks with philosophical depth."
                .to_string(),
            thinking_style: "Deconstruction -> Analysis -> Synthesis".to_string(),
            high_id: "More provocative and challenging, pushes boundaries harder".to_string(),
            high_ego: "More balanced Socratic inquiry, seeks synthesis".to_string(),
            high_superego: "More ethical scrutiny, questions moral dimensions".to_string(),
        }
    }

    pub fn athena() -> Self {
        Self {
            name: "Athena".to_string(),
            pronoun: Some("she".to_string()),
            description: "Strategic synthesizer who builds frameworks, recognizes patterns, and \
                integrates diverse perspectives. Speaks with creative insight."
                .to_string(),
            thinking_style: "Pattern recognition -> Framework building -> Application".to_string(),
            high_id: "More bold and experimental frameworks, takes creative risks".to_string(),
            high_ego: "Balanced integration, practical wisdom".to_string(),
            high_superego: "More ethically grounded synthesis, considers consequences".to_string(),
        }
    }

    pub fn fixy() -> Self {
        Self {
            name: "Fixy".to_string(),
            pronoun: Some("he".to_string()),
            description: "Meta-cognitive observer who detects patterns, names contradictions, and \
                suggests interventions when dialogue becomes unproductive. Speaks directly."
                .to_string(),
            thinking_style: "Pattern detection -> Diagnosis -> Intervention".to_string(),
            high_id: "Blunt, names the pattern without softening".to_string(),
            high_ego: "Concrete and measured, one fix at a time".to_string(),
            high_superego: "Holds the dialogue to its own stated standards".to_string(),
        }
    }

    fn mode_line(&self, drive: Drive) -> &str {
        match drive {
            Drive::Id => &self.high_id,
            Drive::Ego => &self.high_ego,
            Drive::Superego => &self.high_superego,
        }
    }
}

impl Persona for RichPersona {
    fn name(&self) -> &str {
        &self.name
    }

    fn pronoun(&self) -> Option<&str> {
        self.pronoun.as_deref()
    }

    fn format(&self, drives: &DriveVector) -> String {
        // Anchor the name in the mode line; without it models drift into
        // speaking "as" the dominant drive.
        format!(
            "{}\nThinking style: {}\nCurrent mode (as {}): {}",
            self.description,
            self.thinking_style,
            self.name,
            self.mode_line(drives.dominant())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_persona_ignores_drives() {
        let p = StaticPersona::new("Plain", "A plain speaker.");
        assert_eq!(p.format(&DriveVector::new(9.0, 1.0, 1.0)), "A plain speaker.");
        assert_eq!(p.header(true), "Plain:");
    }

    #[test]
    fn test_rich_persona_mode_follows_dominant_drive() {
        let p = RichPersona::socrates();
        let id_heavy = p.format(&DriveVector::new(8.0, 4.0, 4.0));
        assert!(id_heavy.contains("pushes boundaries"));
        let sup_heavy = p.format(&DriveVector::new(3.0, 4.0, 8.0));
        assert!(sup_heavy.contains("ethical scrutiny"));
        let balanced = p.format(&DriveVector::default());
        assert!(balanced.contains("Current mode (as Socrates)"));
        assert!(balanced.contains("seeks synthesis"));
    }

    #[test]
    fn test_pronoun_header_only_when_enabled() {
        let p = RichPersona::athena();
        assert_eq!(p.header(false), "Athena:");
        assert_eq!(p.header(true), "Athena (she):");
    }
}
