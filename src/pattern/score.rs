//! Specificity scoring.
//!
//! | node                 | score                        |
//! |----------------------|------------------------------|
//! | literal phrase       | 10 per word                  |
//! | variable             | 10                           |
//! | `@` / `#` wildcard   | -1                           |
//! | `*` wildcard         | -2                           |
//! | space                | 0                            |
//! | group / optional     | best alternative             |
//! | memo                 | score of the wrapped node    |

use super::{Node, WildcardKind};

/// Score of a missing previous-pattern: the same as a lone `*`, so any real
/// previous-pattern outranks it.
pub(crate) const EMPTY_SCORE: i32 = WildcardKind::Any.score();

impl WildcardKind {
    pub(crate) const fn score(self) -> i32 {
        match self {
            WildcardKind::Any => -2,
            WildcardKind::Alpha | WildcardKind::Digits => -1,
        }
    }
}

pub(crate) fn score_sequence(seq: &[Node]) -> i32 {
    seq.iter().map(score_node).sum()
}

fn score_node(node: &Node) -> i32 {
    match node {
        Node::Literal(text) => 10 * text.split(' ').count() as i32,
        Node::Variable { .. } => 10,
        Node::Wildcard { kind, .. } => kind.score(),
        Node::Space => 0,
        Node::Group(alternatives) | Node::Optional(alternatives) => {
            alternatives.iter().map(|alt| score_sequence(alt)).max().unwrap_or(0)
        }
        Node::Memo(inner) => score_node(inner),
    }
}
