//! Error taxonomy.
//!
//! Two layers:
//!
//! - [`PatternError`] is produced by the pattern compiler. It knows the raw
//!   pattern text and byte offset, but not which rule it belongs to.
//! - [`Error`] is what registration and `reply` return. It tags pattern errors
//!   with the rule or alternate they came from, and adds the turn-level
//!   failures (recursion limit, handler errors, bad reply templates).
//!
//! Variable failures and duplicate rules are absorbed at registration time
//! (logged, not returned); see `engine/database.rs`.

use crate::Scope;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Malformed pattern text.
    #[error("{message} at offset {offset} in \"{pattern}\"")]
    Syntax { message: String, offset: usize, pattern: String },

    /// A `%scope:name` reference that has no value yet.
    #[error("variable {scope}:{name} not found")]
    VariableNotFound { scope: Scope, name: String },

    /// A variable that exists but can't be used as pattern text.
    #[error("variable {scope}:{name} holds a {kind} value, not text")]
    VariableValue { scope: Scope, name: String, kind: &'static str },

    /// The text stored in a variable failed to compile.
    #[error("{source} in variable {scope}:{name}")]
    InVariable {
        scope: Scope,
        name: String,
        #[source]
        source: Box<PatternError>,
    },

    /// Generated regex rejected by the regex engine (size limits and the like).
    #[error("matcher for \"{pattern}\" failed to build: {message}")]
    Regex { pattern: String, message: String },
}

impl PatternError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize, pattern: &str) -> Self {
        PatternError::Syntax { message: message.into(), offset, pattern: pattern.to_string() }
    }

    /// True when the failure can be fixed by defining a variable later.
    pub fn is_unresolved_variable(&self) -> bool {
        matches!(self, PatternError::VariableNotFound { .. })
    }
}

/// Which of a rule's two patterns an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSlot {
    Pattern,
    Previous,
}

impl fmt::Display for PatternSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternSlot::Pattern => f.write_str("pattern"),
            PatternSlot::Previous => f.write_str("previous pattern"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{source} in {slot} of {rule}")]
    Rule {
        rule: String,
        slot: PatternSlot,
        #[source]
        source: PatternError,
    },

    #[error("{source} in alternates[\"{name}\"] of {script}")]
    Alternate {
        script: String,
        name: String,
        #[source]
        source: PatternError,
    },

    #[error("no rules found in batch")]
    NoRulesFound,

    #[error("recursion too deep while replying to \"{message}\" (limit {limit})")]
    RecursionTooDeep { message: String, limit: usize },

    /// Match-time failure building a matcher (bad variable value).
    #[error("{source} while matching rule {rule}")]
    Match {
        rule: String,
        #[source]
        source: PatternError,
    },

    #[error("handler of rule {rule} failed: {source}")]
    Handler {
        rule: String,
        #[source]
        source: crate::HandlerError,
    },

    #[error("unknown placeholder {{{placeholder}}} in reply of rule {rule}")]
    Template { rule: String, placeholder: String },
}
