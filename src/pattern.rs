//! Pattern language compiler.
//!
//! Rule authors write match expressions in a small language that is friendlier
//! than raw regular expressions:
//!
//! ```text
//! hello world         literal words (case-folded)
//! *  #  @             any word / digits / letters, one or more tokens
//! *2  @~3  #2~4  *3~  exact count / at most / between / at least
//! (a|b c)  [a|b]      group (exactly one alternative) / optional
//! _*  _(a|b)          memorize: capture the next item
//! %u:name %b:x %a:y   user / bot / alternate variable reference
//! ```
//!
//! Compilation is a pipeline over a closed node enum:
//!
//! ```text
//! raw ── Scanner (lexer.rs) ── Parser (parser.rs) ──▶ Vec<Node>
//!                                                     ├─ format.rs  canonical text (dedup key)
//!                                                     ├─ score.rs   specificity
//!                                                     └─ codegen.rs anchored regex
//! ```
//!
//! Scoring and formatting are pure functions of the tree. Regex generation
//! depends on live variable values, so it can fail with an unresolved variable;
//! the compiled matcher is therefore cached lazily in the `Pattern` and retried
//! on each match until it succeeds. Once built it is never rebuilt, even if a
//! referenced variable later changes value.

#[path = "pattern/codegen.rs"]
mod codegen;
#[path = "pattern/format.rs"]
mod format;
#[path = "pattern/lexer.rs"]
mod lexer;
#[path = "pattern/parser.rs"]
mod parser;
#[path = "pattern/score.rs"]
mod score;

#[cfg(test)]
#[path = "pattern/tests.rs"]
mod tests;

use crate::error::PatternError;
use crate::{Scope, VariableScopes};
use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

pub(crate) use score::EMPTY_SCORE;

/// Scanning mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every production: wildcards, memos and variables included.
    Full,
    /// Words, spaces, groups and optionals only. Used for text that gets
    /// spliced into other patterns (alternates and variable values).
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WildcardKind {
    /// `@`: letters only.
    Alpha,
    /// `#`: digits only.
    Digits,
    /// `*`: any word characters.
    Any,
}

impl WildcardKind {
    pub(crate) fn from_sigil(c: char) -> Option<WildcardKind> {
        match c {
            '@' => Some(WildcardKind::Alpha),
            '#' => Some(WildcardKind::Digits),
            '*' => Some(WildcardKind::Any),
            _ => None,
        }
    }

    pub(crate) fn sigil(self) -> char {
        match self {
            WildcardKind::Alpha => '@',
            WildcardKind::Digits => '#',
            WildcardKind::Any => '*',
        }
    }
}

/// Parse tree node.
///
/// Invariants maintained by the parser: group and optional alternatives are
/// never empty, sequences never end with `Space`, and `Memo` wraps a wildcard,
/// variable, group or optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// One or more lowercase words separated by single spaces.
    Literal(String),
    /// `min..=max` whitespace separated tokens; `max == None` is unbounded.
    Wildcard { kind: WildcardKind, min: u32, max: Option<u32> },
    Space,
    Group(Vec<Vec<Node>>),
    Optional(Vec<Vec<Node>>),
    Memo(Box<Node>),
    Variable { scope: Scope, name: String },
}

/// A compiled match expression.
#[derive(Debug)]
pub struct Pattern {
    raw: String,
    tree: Vec<Node>,
    canonical: String,
    score: i32,
    memos: usize,
    matcher: OnceCell<Regex>,
}

impl Pattern {
    /// Parse `raw` with the full grammar.
    pub fn parse(raw: &str) -> Result<Pattern, PatternError> {
        Self::with_mode(raw, Mode::Full)
    }

    pub fn with_mode(raw: &str, mode: Mode) -> Result<Pattern, PatternError> {
        let tree = parser::parse(raw, mode)?;
        let canonical = format::format_sequence(&tree);
        let score = score::score_sequence(&tree);
        let memos = count_memos(&tree);
        Ok(Pattern { raw: raw.to_string(), tree, canonical, score, memos, matcher: OnceCell::new() })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tree(&self) -> &[Node] {
        &self.tree
    }

    /// Deterministic re-rendering of the tree; equal for structurally equal trees.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    /// Number of `matchN` capture groups the matcher will have.
    pub fn memo_count(&self) -> usize {
        self.memos
    }

    /// Whether a matcher has been built and cached.
    pub fn is_compiled(&self) -> bool {
        self.matcher.get().is_some()
    }

    /// Regex source for this pattern against the given variables, unanchored.
    #[cfg(test)]
    pub(crate) fn regex_source(&self, vars: &VariableScopes<'_>) -> Result<String, PatternError> {
        codegen::regex_source(&self.tree, vars)
    }

    /// Cached matcher, building it if needed.
    ///
    /// Returns `Ok(None)` when a referenced variable is still undefined; the
    /// next call will try again.
    pub(crate) fn matcher(&self, vars: &VariableScopes<'_>) -> Result<Option<&Regex>, PatternError> {
        match self.matcher.get_or_try_init(|| codegen::compile(&self.tree, &self.canonical, vars)) {
            Ok(re) => Ok(Some(re)),
            Err(e) if e.is_unresolved_variable() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Match the whole of `text`, returning the captures on success.
    pub(crate) fn captures<'t>(
        &self,
        text: &'t str,
        vars: &VariableScopes<'_>,
    ) -> Result<Option<Captures<'t>>, PatternError> {
        Ok(self.matcher(vars)?.and_then(|re| re.captures(text)))
    }
}

fn count_memos(seq: &[Node]) -> usize {
    seq.iter()
        .map(|node| match node {
            Node::Memo(inner) => 1 + count_memos(std::slice::from_ref(inner.as_ref())),
            Node::Group(alternatives) | Node::Optional(alternatives) => {
                alternatives.iter().map(|alt| count_memos(alt)).sum()
            }
            _ => 0,
        })
        .sum()
}
