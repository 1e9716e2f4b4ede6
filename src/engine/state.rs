//! Per-user conversation state.

use super::target::Target;
use crate::Variables;
use std::collections::VecDeque;

/// What the engine remembers about one user between turns.
#[derive(Debug, Clone)]
pub struct ConversationState {
    topic: String,
    variables: Variables,
    /// `(message, reply)` pairs, most recent first.
    history: VecDeque<(Target, Target)>,
    capacity: usize,
}

impl ConversationState {
    pub fn new(topic: impl Into<String>, history_capacity: usize) -> Self {
        ConversationState {
            topic: topic.into(),
            variables: Variables::new(),
            history: VecDeque::with_capacity(history_capacity),
            capacity: history_capacity,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Takes effect on the next reply call; an unknown topic falls back to
    /// the default one at that point.
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Past turns, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &(Target, Target)> {
        self.history.iter()
    }

    /// The bot's most recent reply.
    pub fn last_reply(&self) -> Option<&Target> {
        self.history.front().map(|(_, reply)| reply)
    }

    pub(crate) fn push_history(&mut self, message: Target, reply: Target) {
        if self.capacity == 0 {
            return;
        }
        self.history.push_front((message, reply));
        self.history.truncate(self.capacity);
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut String, &mut Variables) {
        (&mut self.topic, &mut self.variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_most_recent_first() {
        let mut state = ConversationState::new("all", 2);
        for i in 0..3 {
            state.push_history(Target::new(&format!("message {i}")), Target::new(&format!("reply {i}")));
        }
        let replies: Vec<&str> = state.history().map(|(_, r)| r.normalized()).collect();
        assert_eq!(replies, ["reply 2", "reply 1"]);
        assert_eq!(state.last_reply().map(Target::normalized), Some("reply 2"));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut state = ConversationState::new("all", 0);
        state.push_history(Target::new("hi"), Target::new("hello"));
        assert!(state.last_reply().is_none());
    }
}
