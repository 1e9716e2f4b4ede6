//! Recursive descent over the token stream.
//!
//! ```text
//! sequence  := item* ( '|' item* )*        '|' only inside a bracket
//! item      := word | space | wildcard | variable | memo | '(' sequence ')' | '[' sequence ']'
//! memo      := '_' ( wildcard | variable | '(' .. ')' | '[' .. ']' )
//! ```
//!
//! While building a sequence, adjacent `Literal Space Literal` collapse into a
//! single literal phrase, leading and repeated spaces are dropped, and a
//! trailing space is removed when the sequence closes. Scoring and
//! canonicalization rely on this shape.

use super::lexer::{Bracket, Lexeme, Scanner, Token};
use super::{Mode, Node, WildcardKind};
use crate::error::PatternError;

pub(crate) fn parse(raw: &str, mode: Mode) -> Result<Vec<Node>, PatternError> {
    let mut parser = Parser { raw, scanner: Scanner::new(raw, mode) };
    let alternatives = parser.sequence(None)?;
    Ok(alternatives.into_iter().next().unwrap_or_default())
}

struct Parser<'a> {
    raw: &'a str,
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>, offset: usize) -> PatternError {
        PatternError::syntax(message, offset, self.raw)
    }

    /// Parse alternatives until `closer` (or end of input when `None`).
    ///
    /// At top level the result always holds exactly one sequence.
    fn sequence(&mut self, closer: Option<Bracket>) -> Result<Vec<Vec<Node>>, PatternError> {
        let mut alternatives: Vec<Vec<Node>> = Vec::new();
        let mut current: Vec<Node> = Vec::new();

        loop {
            let Some(Token { lexeme, offset }) = self.scanner.next() else {
                if let Some(bracket) = closer {
                    return Err(self.error(format!("missing closing {}", bracket.close_char()), self.raw.len()));
                }
                trim_trailing_space(&mut current);
                if current.is_empty() {
                    return Err(self.error("pattern is empty", 0));
                }
                alternatives.push(current);
                return Ok(alternatives);
            };

            match lexeme {
                Lexeme::Space => push_space(&mut current),
                Lexeme::Word(word) => push_word(&mut current, word),
                Lexeme::Pipe => {
                    if closer.is_none() {
                        return Err(self.error("| must be used within parentheses or square brackets", offset));
                    }
                    self.close_alternative(&mut alternatives, &mut current, offset)?;
                }
                Lexeme::Close(bracket) => {
                    if closer != Some(bracket) {
                        return Err(self.error(format!("unexpected {}", bracket.close_char()), offset));
                    }
                    self.close_alternative(&mut alternatives, &mut current, offset)?;
                    return Ok(alternatives);
                }
                other => {
                    let node = self.item(other, offset)?;
                    current.push(node);
                }
            }
        }
    }

    fn close_alternative(
        &self,
        alternatives: &mut Vec<Vec<Node>>,
        current: &mut Vec<Node>,
        offset: usize,
    ) -> Result<(), PatternError> {
        trim_trailing_space(current);
        if current.is_empty() {
            return Err(self.error("alternatives between parentheses or square brackets can't be empty", offset));
        }
        alternatives.push(std::mem::take(current));
        Ok(())
    }

    /// Parse one atomic item starting with `lexeme`.
    fn item(&mut self, lexeme: Lexeme<'a>, offset: usize) -> Result<Node, PatternError> {
        match lexeme {
            Lexeme::Wildcard(text) => self.wildcard(text, offset),
            Lexeme::Variable(scope, name) => Ok(Node::Variable { scope, name: name.to_string() }),
            Lexeme::Open(Bracket::Group) => Ok(Node::Group(self.sequence(Some(Bracket::Group))?)),
            Lexeme::Open(Bracket::Optional) => Ok(Node::Optional(self.sequence(Some(Bracket::Optional))?)),
            Lexeme::Memo => {
                let Some(next) = self.scanner.next() else {
                    return Err(self.error("nothing to memorize after _", offset));
                };
                match next.lexeme {
                    Lexeme::Wildcard(_) | Lexeme::Variable(..) | Lexeme::Open(_) => {
                        let inner = self.item(next.lexeme, next.offset)?;
                        Ok(Node::Memo(Box::new(inner)))
                    }
                    Lexeme::Invalid(c) => Err(self.error(format!("unexpected character {c}"), next.offset)),
                    _ => Err(self.error("_ must be followed by a wildcard, variable, group or optional", offset)),
                }
            }
            Lexeme::Invalid(c) => Err(self.error(format!("unexpected character {c}"), offset)),
            Lexeme::Word(_) | Lexeme::Space | Lexeme::Pipe | Lexeme::Close(_) => {
                Err(self.error("unexpected token", offset))
            }
        }
    }

    /// `*`, `*3`, `*~3`, `*2~4`, `*2~` and the same for `#` and `@`.
    fn wildcard(&self, text: &str, offset: usize) -> Result<Node, PatternError> {
        let mut chars = text.chars();
        let kind = chars.next().and_then(WildcardKind::from_sigil).ok_or_else(|| self.error("bad wildcard", offset))?;
        let counts = chars.as_str();
        let (low, high) = match counts.split_once('~') {
            Some((low, high)) => (low, Some(high)),
            None => (counts, None),
        };

        let count = |digits: &str| {
            digits.parse::<u32>().map_err(|_| self.error(format!("wildcard count {digits} is too large"), offset))
        };

        let mut min = 1;
        let mut max = None;
        if !low.is_empty() {
            min = count(low)?;
            max = Some(min);
        }
        if let Some(high) = high {
            max = if high.is_empty() { None } else { Some(count(high)?) };
        }
        let min = min.max(1);
        let max = max.map(|m| m.max(min));

        Ok(Node::Wildcard { kind, min, max })
    }
}

fn push_space(seq: &mut Vec<Node>) {
    if matches!(seq.last(), Some(node) if *node != Node::Space) {
        seq.push(Node::Space);
    }
}

fn push_word(seq: &mut Vec<Node>, word: &str) {
    let word = word.to_lowercase();
    if let [.., Node::Literal(_), Node::Space] = seq.as_slice() {
        seq.pop();
        if let Some(Node::Literal(phrase)) = seq.last_mut() {
            phrase.push(' ');
            phrase.push_str(&word);
            return;
        }
    }
    seq.push(Node::Literal(word));
}

fn trim_trailing_space(seq: &mut Vec<Node>) {
    if seq.last() == Some(&Node::Space) {
        seq.pop();
    }
}
