//! Canonical formatting.
//!
//! Renders a tree back to pattern text with a fixed spelling: single spaces,
//! lowercase literals, wildcard counts in their shortest form, alternatives in
//! original order. Parsing the output yields the same tree, so the string is a
//! structural identity and serves as the rule dedup key.

use super::Node;
use std::fmt::{self, Write};

pub(crate) fn format_sequence(seq: &[Node]) -> String {
    let mut out = String::new();
    for node in seq {
        // Writing into a String can't fail.
        let _ = write!(out, "{node}");
    }
    out
}

fn write_alternatives(f: &mut fmt::Formatter<'_>, open: char, alternatives: &[Vec<Node>], close: char) -> fmt::Result {
    f.write_char(open)?;
    for (i, alternative) in alternatives.iter().enumerate() {
        if i > 0 {
            f.write_char('|')?;
        }
        for node in alternative {
            write!(f, "{node}")?;
        }
    }
    f.write_char(close)
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(text) => f.write_str(text),
            Node::Wildcard { kind, min, max } => {
                f.write_char(kind.sigil())?;
                match (*min, *max) {
                    (min, Some(max)) if min == max => write!(f, "{min}"),
                    (1, None) => Ok(()),
                    (1, Some(max)) => write!(f, "~{max}"),
                    (min, Some(max)) => write!(f, "{min}~{max}"),
                    (min, None) => write!(f, "{min}~"),
                }
            }
            Node::Space => f.write_char(' '),
            Node::Group(alternatives) => write_alternatives(f, '(', alternatives, ')'),
            Node::Optional(alternatives) => write_alternatives(f, '[', alternatives, ']'),
            Node::Memo(inner) => write!(f, "_{inner}"),
            Node::Variable { scope, name } => write!(f, "{scope}:{name}"),
        }
    }
}
