//! Regex generation.
//!
//! Matchers run against a `Target`'s normalized text: lowercase word tokens
//! separated by single spaces. Every word-level item ends with `\b` so that a
//! literal can't match a prefix of a longer word.
//!
//! ```text
//! hello world   -> hello world\b
//! *             -> (?:\w+\s){0,}?\w+\b
//! @1            -> [^_\d\W]+\b
//! #2~4          -> (?:\d+\s){1,3}?\d+\b
//! [a|b]         -> (?:a\b|b\b)?
//! _*            -> (?P<match0>(?:\w+\s){0,}?\w+\b)
//! %u:name       -> <value compiled in simple mode>\b
//! ```
//!
//! Multi-token wildcards are written as `n-1` lazy repetitions of
//! `token + space` followed by one final token, which gives an exact word-count
//! ceiling without nested quantifiers over the same text.
//!
//! Capture groups are numbered `match0..` in left-to-right tree order; the
//! counter starts fresh for every pattern.

use super::parser::parse;
use super::{Mode, Node, WildcardKind};
use crate::VariableScopes;
use crate::error::PatternError;
use regex::{Regex, RegexBuilder};
use std::fmt::Write;

/// Compiled program budget per matcher. Unicode `\w` is large, so a few
/// hundred bounded repetitions already overflow the regex crate's default.
const SIZE_LIMIT: usize = 64 << 20;

pub(crate) fn regex_source(seq: &[Node], vars: &VariableScopes<'_>) -> Result<String, PatternError> {
    let mut out = String::new();
    let mut counter = 0;
    emit_sequence(seq, &mut counter, vars, &mut out)?;
    Ok(out)
}

/// Build the anchored matcher for a tree.
pub(crate) fn compile(seq: &[Node], canonical: &str, vars: &VariableScopes<'_>) -> Result<Regex, PatternError> {
    let source = format!("^(?:{})$", regex_source(seq, vars)?);
    log::debug!("compiled pattern \"{canonical}\" to /{source}/");
    RegexBuilder::new(&source)
        .size_limit(SIZE_LIMIT)
        .build()
        .map_err(|e| PatternError::Regex { pattern: canonical.to_string(), message: e.to_string() })
}

fn class(kind: WildcardKind) -> &'static str {
    match kind {
        WildcardKind::Alpha => r"[^_\d\W]+",
        WildcardKind::Digits => r"\d+",
        WildcardKind::Any => r"\w+",
    }
}

fn emit_sequence(
    seq: &[Node],
    counter: &mut usize,
    vars: &VariableScopes<'_>,
    out: &mut String,
) -> Result<(), PatternError> {
    for node in seq {
        emit_node(node, counter, vars, out)?;
    }
    Ok(())
}

fn emit_alternatives(
    alternatives: &[Vec<Node>],
    counter: &mut usize,
    vars: &VariableScopes<'_>,
    out: &mut String,
) -> Result<(), PatternError> {
    out.push_str("(?:");
    for (i, alternative) in alternatives.iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        emit_sequence(alternative, counter, vars, out)?;
    }
    out.push(')');
    Ok(())
}

fn emit_node(node: &Node, counter: &mut usize, vars: &VariableScopes<'_>, out: &mut String) -> Result<(), PatternError> {
    match node {
        Node::Literal(text) => {
            out.push_str(&regex::escape(text));
            out.push_str(r"\b");
        }
        Node::Wildcard { kind, min, max } => {
            let class = class(*kind);
            if *max == Some(1) {
                let _ = write!(out, r"{class}\b");
            } else {
                let low = min - 1;
                let high = max.map(|m| (m - 1).to_string()).unwrap_or_default();
                let _ = write!(out, r"(?:{class}\s){{{low},{high}}}?{class}\b");
            }
        }
        Node::Space => out.push_str(r"\s?"),
        Node::Group(alternatives) => emit_alternatives(alternatives, counter, vars, out)?,
        Node::Optional(alternatives) => {
            emit_alternatives(alternatives, counter, vars, out)?;
            out.push('?');
        }
        Node::Memo(inner) => {
            let _ = write!(out, "(?P<match{}>", *counter);
            *counter += 1;
            emit_node(inner, counter, vars, out)?;
            out.push(')');
        }
        Node::Variable { scope, name } => {
            let value = vars
                .lookup(*scope, name)
                .ok_or_else(|| PatternError::VariableNotFound { scope: *scope, name: name.clone() })?;
            let text = value.as_text().ok_or_else(|| PatternError::VariableValue {
                scope: *scope,
                name: name.clone(),
                kind: value.kind(),
            })?;
            let in_variable = |e: PatternError| PatternError::InVariable {
                scope: *scope,
                name: name.clone(),
                source: Box::new(e),
            };
            // Simple mode has no memos, wildcards or variables, so the spliced
            // fragment never touches the capture counter or the tables.
            let tree = parse(&text.to_lowercase(), Mode::Simple).map_err(in_variable)?;
            let fragment = regex_source(&tree, &VariableScopes::default()).map_err(in_variable)?;
            out.push_str(&fragment);
            out.push_str(r"\b");
        }
    }
    Ok(())
}
