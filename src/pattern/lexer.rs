//! Pattern tokenizer.
//!
//! A single combined regex tries every production in priority order at the
//! current position; the first alternative that matches wins (leftmost-first,
//! not longest). Several productions need one character of lookahead (a word
//! must be followed by whitespace, a closer or the end). The lookahead is part
//! of the combined match but only the production's named group is consumed.
//!
//! The catch-all `INVALID` production comes last so that anything the grammar
//! doesn't recognise is reported at its offset instead of being skipped.

use super::Mode;
use crate::Scope;
use once_cell::sync::Lazy;
use regex::Regex;

bitflags::bitflags! {
    /// Grammar productions enabled for a scanning mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct Productions: u16 {
        const WILDCARD       = 1 << 0;
        const MEMO           = 1 << 1;
        const WORD           = 1 << 2;
        const SPACE          = 1 << 3;
        const VARIABLE       = 1 << 4;
        const OPEN_OPTIONAL  = 1 << 5;
        const CLOSE_OPTIONAL = 1 << 6;
        const OPEN_GROUP     = 1 << 7;
        const CLOSE_GROUP    = 1 << 8;
        const PIPE           = 1 << 9;
        const INVALID        = 1 << 10;

        const SIMPLE = Self::WORD.bits()
            | Self::SPACE.bits()
            | Self::OPEN_OPTIONAL.bits()
            | Self::CLOSE_OPTIONAL.bits()
            | Self::OPEN_GROUP.bits()
            | Self::CLOSE_GROUP.bits()
            | Self::PIPE.bits()
            | Self::INVALID.bits();
        const FULL = Self::SIMPLE.bits()
            | Self::WILDCARD.bits()
            | Self::MEMO.bits()
            | Self::VARIABLE.bits();
    }
}

impl Productions {
    fn for_mode(mode: Mode) -> Productions {
        match mode {
            Mode::Full => Productions::FULL,
            Mode::Simple => Productions::SIMPLE,
        }
    }
}

/// Which bracket pair a group-like token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bracket {
    /// `( ... )`
    Group,
    /// `[ ... ]`
    Optional,
}

impl Bracket {
    pub fn close_char(self) -> char {
        match self {
            Bracket::Group => ')',
            Bracket::Optional => ']',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexeme<'a> {
    /// Full wildcard text, e.g. `*`, `@2~4`.
    Wildcard(&'a str),
    Memo,
    Word(&'a str),
    Space,
    Variable(Scope, &'a str),
    Open(Bracket),
    Close(Bracket),
    Pipe,
    Invalid(char),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Token<'a> {
    pub lexeme: Lexeme<'a>,
    /// Byte offset of the token in the raw pattern.
    pub offset: usize,
}

// Terminator lookahead shared by words, wildcards, variables and closers.
const END: &str = r"(?:[\])|\s]|$)";

/// Turns the text of a production's named group into its lexeme.
type Build = for<'a> fn(&'a str) -> Option<Lexeme<'a>>;

fn wildcard(text: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Wildcard(text))
}

fn memo(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Memo)
}

fn word(text: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Word(text))
}

fn space(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Space)
}

/// `%x:name`; the production only admits u, b and a.
fn variable(text: &str) -> Option<Lexeme<'_>> {
    let scope = text.chars().nth(1).and_then(Scope::from_sigil)?;
    Some(Lexeme::Variable(scope, &text[3..]))
}

fn open_optional(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Open(Bracket::Optional))
}

fn close_optional(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Close(Bracket::Optional))
}

fn open_group(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Open(Bracket::Group))
}

fn close_group(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Close(Bracket::Group))
}

fn pipe(_: &str) -> Option<Lexeme<'_>> {
    Some(Lexeme::Pipe)
}

fn invalid(text: &str) -> Option<Lexeme<'_>> {
    text.chars().next().map(Lexeme::Invalid)
}

/// (production, group name, regex body, lexeme builder). Order is priority order.
fn grammar() -> Vec<(Productions, &'static str, String, Build)> {
    vec![
        (Productions::WILDCARD, "wild", format!(r"(?P<wild>[*#@]\d*~?\d*){END}"), wildcard),
        (Productions::MEMO, "memo", r"(?P<memo>_)[*#@%(\[]".to_string(), memo),
        (Productions::WORD, "word", format!(r"(?P<word>[^_\W][\w-]*){END}"), word),
        (Productions::SPACE, "space", r"(?P<space>\s+)".to_string(), space),
        (Productions::VARIABLE, "var", format!(r"(?P<var>%[uba]:[^_\d\W][\w-]*){END}"), variable),
        (Productions::OPEN_OPTIONAL, "lbracket", r"(?P<lbracket>\[)".to_string(), open_optional),
        (Productions::CLOSE_OPTIONAL, "rbracket", format!(r"(?P<rbracket>\]){END}"), close_optional),
        (Productions::OPEN_GROUP, "lparen", r"(?P<lparen>\()".to_string(), open_group),
        (Productions::CLOSE_GROUP, "rparen", format!(r"(?P<rparen>\)){END}"), close_group),
        (Productions::PIPE, "pipe", r"(?P<pipe>\|)".to_string(), pipe),
        (Productions::INVALID, "invalid", r"(?P<invalid>(?s:.))".to_string(), invalid),
    ]
}

/// Combined scanner regex plus the enabled group names, each next to the
/// builder for its lexeme.
#[derive(Debug)]
struct ScanTable {
    regex: Regex,
    groups: Vec<(&'static str, Build)>,
}

impl ScanTable {
    fn build(enabled: Productions) -> ScanTable {
        let mut bodies = Vec::new();
        let mut groups = Vec::new();
        for (production, group, body, build) in grammar() {
            if enabled.contains(production) {
                bodies.push(body);
                groups.push((group, build));
            }
        }
        let source = format!("^(?:{})", bodies.join("|"));
        let regex = Regex::new(&source).unwrap();
        ScanTable { regex, groups }
    }
}

static FULL_TABLE: Lazy<ScanTable> = Lazy::new(|| ScanTable::build(Productions::for_mode(Mode::Full)));
static SIMPLE_TABLE: Lazy<ScanTable> = Lazy::new(|| ScanTable::build(Productions::for_mode(Mode::Simple)));

/// Iterator over the tokens of a raw pattern.
pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    table: &'static ScanTable,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str, mode: Mode) -> Self {
        let table = match mode {
            Mode::Full => &*FULL_TABLE,
            Mode::Simple => &*SIMPLE_TABLE,
        };
        Scanner { input, pos: 0, table }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            return None;
        }
        let caps = self.table.regex.captures(rest)?;
        let (build, m) = self.table.groups.iter().find_map(|&(group, build)| caps.name(group).map(|m| (build, m)))?;

        let offset = self.pos;
        self.pos += m.end();
        let lexeme = build(m.as_str())?;

        Some(Token { lexeme, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexemes(input: &str, mode: Mode) -> Vec<Lexeme<'_>> {
        Scanner::new(input, mode).map(|t| t.lexeme).collect()
    }

    #[test]
    fn scans_full_grammar() {
        let got = lexemes("_(hi|%u:name) *2~3", Mode::Full);
        assert_eq!(
            got,
            vec![
                Lexeme::Memo,
                Lexeme::Open(Bracket::Group),
                Lexeme::Word("hi"),
                Lexeme::Pipe,
                Lexeme::Variable(Scope::User, "name"),
                Lexeme::Close(Bracket::Group),
                Lexeme::Space,
                Lexeme::Wildcard("*2~3"),
            ]
        );
    }

    #[test]
    fn every_production_has_a_lexeme() {
        let got = lexemes("[a] _%b:x|$", Mode::Full);
        assert_eq!(
            got,
            vec![
                Lexeme::Open(Bracket::Optional),
                Lexeme::Word("a"),
                Lexeme::Close(Bracket::Optional),
                Lexeme::Space,
                Lexeme::Memo,
                Lexeme::Variable(Scope::Bot, "x"),
                Lexeme::Pipe,
                Lexeme::Invalid('$'),
            ]
        );
    }

    #[test]
    fn simple_mode_treats_wildcards_as_invalid() {
        let got = lexemes("a *", Mode::Simple);
        assert_eq!(got, vec![Lexeme::Word("a"), Lexeme::Space, Lexeme::Invalid('*')]);
        assert_eq!(lexemes("%u:x", Mode::Simple)[0], Lexeme::Invalid('%'));
    }

    #[test]
    fn word_needs_a_terminator() {
        // "la*la": the word production fails its lookahead, so the scanner
        // falls through to the catch-all.
        assert_eq!(lexemes("la*la", Mode::Full)[0], Lexeme::Invalid('l'));
    }

    #[test]
    fn offsets_are_byte_positions() {
        let offsets: Vec<usize> = Scanner::new("voilà [x]", Mode::Full).map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 6, 7, 8, 9]);
    }
}
