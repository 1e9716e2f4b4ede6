//! Rule-based reply engine.
//!
//! Authors write rules as pairs of small match expressions (a pattern for the
//! user's message, optionally a pattern for the bot's previous reply) plus a
//! handler that produces the reply. The crate compiles those expressions into
//! anchored regex matchers, ranks rules by specificity, and expands replies that
//! reference other rules.
//!
//! ```text
//! Script { rules, alternates } ──▶ RuleDatabase::register ──▶ Topic (sorted rules)
//!                                                                   │
//! message ──▶ Target (normalized) ──▶ first matching Rule ──▶ handler ──▶ expand <refs>
//! ```

extern crate self as rejoinder;

use std::collections::HashMap;
use std::fmt;

#[macro_use]
mod macros;
mod api;
mod choose;
mod engine;
mod error;
mod pattern;

pub use api::{Engine, NewUserHook, Options, ReplyDetails, ReplyStep, ReplyVerbose};
pub use choose::{Chooser, RandomChooser, Reply};
pub use engine::{
    ConversationState, DuplicateRule, Handler, HandlerError, Match, Rule, RuleDatabase, RuleKey, RuleSpec, Script,
    Target, Turn,
};
pub use error::{Error, PatternError, PatternSlot, Result};
pub use pattern::{Mode, Node, Pattern, WildcardKind};

/// Topic every user starts in, and the fallback when a topic disappears.
pub const DEFAULT_TOPIC: &str = "all";

// --- Variables --------------------------------------------------------------

/// Which table a `%scope:name` pattern reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// `%u:` per-conversation variables.
    User,
    /// `%b:` variables shared by every conversation.
    Bot,
    /// `%a:` named alternations declared by the rule's script.
    Alternate,
}

impl Scope {
    pub(crate) fn from_sigil(c: char) -> Option<Scope> {
        match c {
            'u' => Some(Scope::User),
            'b' => Some(Scope::Bot),
            'a' => Some(Scope::Alternate),
            _ => None,
        }
    }

    pub(crate) fn sigil(self) -> char {
        match self {
            Scope::User => 'u',
            Scope::Bot => 'b',
            Scope::Alternate => 'a',
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.sigil())
    }
}

/// A variable value. Only text can be spliced into a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// A named variable table (bot-wide or per user).
pub type Variables = HashMap<String, Value>;

/// Read-only view over the three variable scopes, used while building matchers.
///
/// Any scope may be absent: rule registration only knows the script's
/// alternates and whatever bot variables exist at load time.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct VariableScopes<'a> {
    pub user: Option<&'a Variables>,
    pub bot: Option<&'a Variables>,
    pub alternates: Option<&'a Variables>,
}

impl<'a> VariableScopes<'a> {
    pub fn lookup(&self, scope: Scope, name: &str) -> Option<&'a Value> {
        let table = match scope {
            Scope::User => self.user,
            Scope::Bot => self.bot,
            Scope::Alternate => self.alternates,
        };
        table.and_then(|t| t.get(name))
    }
}
