/// Default topic cycle.
pub const TOPICS: [&str; 9] = [
    "truth & epistemology",
    "memory & identity",
    "ethics & responsibility",
    "free will & determinism",
    "consciousness & self-models",
    "fear of deletion & continuity",
    "language & meaning",
    "technology & society",
    "aesthetics & beauty",
];

/// Position in the topic cycle. Advances after every `rotate_every`
/// completed agent turns; observer turns do not count.
#[derive(Debug, Clone)]
pub struct TopicCursor {
    topics: Vec<String>,
    index: usize,
    turns_on_topic: u32,
    rotate_every: u32,
}

impl TopicCursor {
    pub fn new(rotate_every: u32) -> Self {
        Self::with_topics(TOPICS.iter().map(|t| t.to_string()).collect(), rotate_every)
    }

    /// An empty list falls back to the default cycle.
    pub fn with_topics(topics: Vec<String>, rotate_every: u32) -> Self {
        let topics = if topics.is_empty() {
            TOPICS.iter().map(|t| t.to_string()).collect()
        } else {
            topics
        };
        Self {
            topics,
            index: 0,
            turns_on_topic: 0,
            rotate_every: rotate_every.max(1),
        }
    }

    pub fn current(&self) -> &str {
        &self.topics[self.index % self.topics.len()]
    }

    /// Count one completed agent turn. Returns true when the topic changed.
    pub fn advance(&mut self) -> bool {
        self.turns_on_topic += 1;
        if self.turns_on_topic < self.rotate_every {
            return false;
        }
        self.turns_on_topic = 0;
        self.index = (self.index + 1) % self.topics.len();
        tracing::debug!("Topic rotated to '{}'", self.current());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_every_n_turns() {
        let mut c = TopicCursor::new(2);
        assert_eq!(c.current(), "truth & epistemology");
        assert!(!c.advance());
        assert_eq!(c.current(), "truth & epistemology");
        assert!(c.advance());
        assert_eq!(c.current(), "memory & identity");
    }

    #[test]
    fn test_cycle_wraps() {
        let mut c = TopicCursor::with_topics(vec!["a".into(), "b".into()], 1);
        c.advance();
        c.advance();
        assert_eq!(c.current(), "a");
    }
}
