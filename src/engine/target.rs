//! Message normalization.
//!
//! A `Target` is the view of one line of text that matchers run against.
//!
//! ```text
//! "I'm tired, Bob!"   raw_words       ["I'm", "tired,", "Bob!"]
//!   lowercase + substitute ("i'm" -> "i am")
//!   strip non-word characters
//!                     tokenized_words [["i", "am"], ["tired"], ["bob"]]
//!                     normalized      "i am tired bob"
//! ```
//!
//! Tokens left empty after stripping (e.g. a lone ":)") are dropped, so the
//! normalized text never has doubled or trailing spaces. `word_offsets` records
//! where each raw word's first token starts in `normalized`; capture spans are
//! mapped back to raw words through it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    raw_text: String,
    raw_words: Vec<String>,
    tokenized_words: Vec<Vec<String>>,
    normalized: String,
    word_offsets: Vec<Option<usize>>,
}

impl Target {
    /// Normalize `text` without any substitutions.
    pub fn new(text: &str) -> Target {
        Self::with_substitutions(text, |_| None)
    }

    /// Normalize `text`, replacing whole lowercased words found by `lookup`
    /// with the returned phrase before punctuation is stripped.
    pub fn with_substitutions<'s>(text: &str, lookup: impl Fn(&str) -> Option<&'s str>) -> Target {
        let raw_words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let mut tokenized_words = Vec::with_capacity(raw_words.len());
        let mut word_offsets = Vec::with_capacity(raw_words.len());
        let mut normalized = String::with_capacity(text.len());

        for word in &raw_words {
            let lower = word.to_lowercase();
            let replaced = lookup(&lower).unwrap_or(&lower);
            let tokens: Vec<String> = replaced
                .split_whitespace()
                .map(|t| regex!(r"\W+").replace_all(t, "").into_owned())
                .filter(|t| !t.is_empty())
                .collect();

            if tokens.is_empty() {
                word_offsets.push(None);
            } else {
                if !normalized.is_empty() {
                    normalized.push(' ');
                }
                word_offsets.push(Some(normalized.len()));
                normalized.push_str(&tokens.join(" "));
            }
            tokenized_words.push(tokens);
        }

        log::debug!("normalized {text:?} to {normalized:?}");
        Target { raw_text: text.to_string(), raw_words, tokenized_words, normalized, word_offsets }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn raw_words(&self) -> &[String] {
        &self.raw_words
    }

    pub fn tokenized_words(&self) -> &[Vec<String>] {
        &self.tokenized_words
    }

    /// The only string matchers ever see.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Original words covering the normalized byte range `start..end`.
    ///
    /// A raw word is included when its first token starts inside the range;
    /// an empty range yields an empty string.
    pub fn raw_span(&self, start: usize, end: usize) -> String {
        if start >= end {
            return String::new();
        }
        self.raw_words
            .iter()
            .zip(&self.word_offsets)
            .filter_map(|(word, offset)| offset.filter(|&o| o >= start && o < end).map(|_| word.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn target_shapes_are_consistent() {
        let cases = [r"ABC_abc 123 !@#$%^&**()-=+|}{[]\~~`';:/.,<>?", "", "Apples, oranges and bananas!", "This one isn't as hard"];
        for text in cases {
            let t = Target::new(text);
            assert_eq!(t.raw_text(), text);
            assert_eq!(t.raw_words().len(), t.tokenized_words().len());
            assert!(!t.normalized().starts_with(' ') && !t.normalized().ends_with(' '));
            assert!(!t.normalized().contains("  "));
        }
    }

    #[test]
    fn normalizes_with_substitutions() {
        let subs: HashMap<&str, &str> = HashMap::from([("i'm", "i am"), ("bacon,", "bacon comma")]);
        let lookup = |w: &str| subs.get(w).copied();

        let cases = [
            ("I'm tired today!", "i am tired today"),
            ("Bob's cat is missing.", "bobs cat is missing"),
            ("Wazzup! :)", "wazzup"),
            ("I need bacon, eggs and milk.", "i need bacon comma eggs and milk"),
        ];
        for (text, normalized) in cases {
            assert_eq!(Target::with_substitutions(text, lookup).normalized(), normalized);
        }

        let t = Target::with_substitutions("I'm tired", lookup);
        assert_eq!(t.tokenized_words(), &[vec!["i".to_string(), "am".to_string()], vec!["tired".to_string()]]);
    }

    #[test]
    fn raw_span_maps_back_to_original_words() {
        let t = Target::new("Well, I'll put you down as Flintstone, Fred.");
        assert_eq!(t.normalized(), "well ill put you down as flintstone fred");
        // "flintstone fred"
        let start = t.normalized().find("flintstone").unwrap();
        assert_eq!(t.raw_span(start, t.normalized().len()), "Flintstone, Fred.");
        assert_eq!(t.raw_span(0, 4), "Well,");
        assert_eq!(t.raw_span(3, 3), "");
    }

    #[test]
    fn raw_span_skips_words_without_tokens() {
        let t = Target::new("hi :) there");
        assert_eq!(t.normalized(), "hi there");
        assert_eq!(t.raw_span(0, t.normalized().len()), "hi there");
    }
}
