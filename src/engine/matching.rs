//! Rule matching and capture extraction.
//!
//! A rule matches when its pattern matches the message's normalized text and,
//! if it has a previous-pattern, that one matches the normalized text of the
//! bot's most recent reply. A rule with a previous-pattern never matches while
//! the history is empty.
//!
//! Captures are keyed the way reply templates name them:
//!
//! ```text
//! match0 .. matchN              message pattern, normalized text
//! raw_match0 ..                 same spans, original words
//! reply_match0 ..               previous-pattern, normalized text
//! raw_reply_match0 ..           same spans, original words
//! ```

use super::database::Rule;
use super::target::Target;
use crate::VariableScopes;
use crate::error::PatternError;
use regex::Captures;
use std::collections::BTreeMap;

/// Captured values of one successful rule match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    normalized: BTreeMap<String, String>,
    raw: BTreeMap<String, String>,
}

impl Match {
    fn record(&mut self, prefix: &str, caps: &Captures<'_>, target: &Target, memos: usize) {
        for i in 0..memos {
            let group = format!("match{i}");
            let (text, raw) = match caps.name(&group) {
                Some(m) => (m.as_str().to_string(), target.raw_span(m.start(), m.end())),
                // Memo inside an alternative that didn't take part.
                None => (String::new(), String::new()),
            };
            let key = format!("{prefix}{group}");
            self.normalized.insert(key.clone(), text);
            self.raw.insert(key, raw);
        }
    }

    /// `{match<i>}`: normalized text of the message pattern's `i`-th memo.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.named(&format!("match{i}"))
    }

    /// `{raw_match<i>}`: the same capture in the user's own words.
    pub fn raw(&self, i: usize) -> Option<&str> {
        self.named(&format!("raw_match{i}"))
    }

    /// `{reply_match<i>}`: capture of the previous-pattern.
    pub fn reply(&self, i: usize) -> Option<&str> {
        self.named(&format!("reply_match{i}"))
    }

    pub fn raw_reply(&self, i: usize) -> Option<&str> {
        self.named(&format!("raw_reply_match{i}"))
    }

    /// Look a capture up by its template name.
    pub fn named(&self, name: &str) -> Option<&str> {
        match name.strip_prefix("raw_") {
            Some(key) => self.raw.get(key),
            None => self.normalized.get(name),
        }
        .map(String::as_str)
    }

    /// Number of message-pattern captures.
    pub fn len(&self) -> usize {
        self.normalized.keys().filter(|k| k.starts_with("match")).count()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Substitute `{name}` placeholders in `template`.
    ///
    /// `{{` and `}}` stand for literal braces. On an unknown or unterminated
    /// placeholder, returns its text as the error.
    pub fn render(&self, template: &str) -> Result<String, String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
            } else if let Some(inner) = tail.strip_prefix('{') {
                let end = inner.find('}').ok_or_else(|| inner.to_string())?;
                let name = &inner[..end];
                out.push_str(self.named(name).ok_or_else(|| name.to_string())?);
                rest = &inner[end + 1..];
            } else {
                // A lone `}`.
                out.push('}');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Rule {
    /// Match against a message and, when needed, the last reply.
    ///
    /// `Ok(None)` also covers a matcher that still can't be built because a
    /// variable it references is undefined.
    pub(crate) fn matches(
        &self,
        message: &Target,
        last_reply: Option<&Target>,
        vars: &VariableScopes<'_>,
    ) -> Result<Option<Match>, PatternError> {
        let Some(caps) = self.pattern().captures(message.normalized(), vars)? else {
            return Ok(None);
        };
        let mut matched = Match::default();
        matched.record("", &caps, message, self.pattern().memo_count());

        if let Some(previous) = self.previous() {
            let Some(reply) = last_reply else {
                return Ok(None);
            };
            let Some(caps) = previous.captures(reply.normalized(), vars)? else {
                return Ok(None);
            };
            matched.record("reply_", &caps, reply, previous.memo_count());
        }
        Ok(Some(matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Match {
        let target = Target::new("Call me Fred, please");
        let pattern = crate::Pattern::parse("call me _* please").unwrap();
        let caps = pattern.captures(target.normalized(), &VariableScopes::default()).unwrap().unwrap();
        let mut m = Match::default();
        m.record("", &caps, &target, pattern.memo_count());
        m
    }

    #[test]
    fn records_normalized_and_raw_captures() {
        let m = sample();
        assert_eq!(m.get(0), Some("fred"));
        assert_eq!(m.raw(0), Some("Fred,"));
        assert_eq!(m.get(1), None);
        assert_eq!(m.reply(0), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn renders_templates() {
        let m = sample();
        assert_eq!(m.render("hi {match0}!").unwrap(), "hi fred!");
        assert_eq!(m.render("{raw_match0} {{literally}}").unwrap(), "Fred, {literally}");
        assert_eq!(m.render("no placeholders").unwrap(), "no placeholders");
        assert_eq!(m.render("a } b").unwrap(), "a } b");
        assert_eq!(m.render("{match1}").unwrap_err(), "match1");
        assert_eq!(m.render("oops {match0").unwrap_err(), "match0");
    }
}
