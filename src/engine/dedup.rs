//! Deduplication keys for rule registration.
//!
//! Two rules in the same topic are "the same rule" when their patterns and
//! previous-patterns have identical canonical forms. Spelling differences that
//! normalize away (case, extra spaces, `*0~` vs `*`) therefore collide:
//!
//! ```text
//! "Hello  World"        -> RuleKey("hello world", "")
//! "hello world"         -> RuleKey("hello world", "")      duplicate
//! "hello world" / "*"   -> RuleKey("hello world", "*")     distinct
//! ```
//!
//! The first registration wins. Later ones are reported as a `DuplicateRule`
//! and logged, unless they carry the very same handler (the same rule seen
//! twice, e.g. a script loaded twice), which is ignored silently.

use std::fmt;

/// Identity of a rule within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    /// Canonical form of the message pattern.
    pub pattern: String,
    /// Canonical form of the previous-reply pattern, or empty.
    pub previous: String,
}

impl RuleKey {
    pub(crate) fn new(pattern: &str, previous: Option<&str>) -> Self {
        RuleKey { pattern: pattern.to_string(), previous: previous.unwrap_or_default().to_string() }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.previous.is_empty() {
            write!(f, "\"{}\"", self.pattern)
        } else {
            write!(f, "\"{}\" after \"{}\"", self.pattern, self.previous)
        }
    }
}

/// A rule that was dropped because an equivalent one was registered first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRule {
    pub topic: String,
    pub key: RuleKey,
    /// Name of the rule that was kept.
    pub kept: String,
    /// Name of the rule that was ignored.
    pub ignored: String,
}

impl fmt::Display for DuplicateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} ignored in topic {:?}: {} is already handled by {}",
            self.ignored, self.topic, self.key, self.kept
        )
    }
}
