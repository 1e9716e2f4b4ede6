//! Turn orchestration.
//!
//! `TurnRunner` is the per-call working set: borrowed database and options,
//! the bot variables, the chooser, and the calling user's state. One runner
//! answers one user message:
//!
//! 1. resolve the user's topic, falling back to the default one if it is gone;
//! 2. normalize the message with that topic's substitutions;
//! 3. take the first rule (in ranked order) that matches;
//! 4. call its handler, let the chooser pick one string, render captures;
//! 5. answer every `<reference>` in the result with a nested call, splicing
//!    right to left so earlier byte ranges stay valid;
//! 6. on the outermost call only, push `(message, reply)` into history.
//!
//! Nested calls re-resolve the topic, so a handler that switches topic
//! affects the references in its own reply. Any error unwinds the whole turn
//! before history is touched; variable writes made by handlers that already
//! ran are kept.

use super::database::{Rule, RuleDatabase, Topic};
use super::matching::Match;
use super::metrics::{StepMetrics, TurnMetrics};
use super::state::ConversationState;
use super::target::Target;
use crate::api::Options;
use crate::choose::Chooser;
use crate::error::{Error, Result};
use crate::{Value, VariableScopes, Variables};
use log::{debug, warn};
use std::collections::HashMap;
use std::ops::Range;
use std::time::Instant;

/// What a handler sees while producing a reply.
pub struct Turn<'a> {
    user_id: &'a str,
    rule: &'a str,
    matched: &'a Match,
    topic: &'a mut String,
    user_vars: &'a mut Variables,
    bot_vars: &'a mut Variables,
    depth: usize,
}

impl Turn<'_> {
    pub fn user_id(&self) -> &str {
        self.user_id
    }

    /// Qualified name of the rule being answered.
    pub fn rule_name(&self) -> &str {
        self.rule
    }

    pub fn matched(&self) -> &Match {
        self.matched
    }

    /// Shorthand for `matched().get(i)`.
    pub fn capture(&self, i: usize) -> Option<&str> {
        self.matched.get(i)
    }

    /// 0 for the user's own message, higher inside `<reference>` expansion.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        *self.topic = topic.into();
    }

    pub fn user_vars(&self) -> &Variables {
        &*self.user_vars
    }

    pub fn user_vars_mut(&mut self) -> &mut Variables {
        self.user_vars
    }

    pub fn bot_vars(&self) -> &Variables {
        &*self.bot_vars
    }

    pub fn bot_vars_mut(&mut self) -> &mut Variables {
        self.bot_vars
    }

    pub fn set_user_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.user_vars.insert(name.into(), value.into());
    }

    pub fn set_bot_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bot_vars.insert(name.into(), value.into());
    }
}

pub(crate) struct TurnRunner<'a> {
    pub db: &'a RuleDatabase,
    pub options: &'a Options,
    pub substitutions: &'a HashMap<String, String>,
    pub bot_vars: &'a mut Variables,
    pub chooser: &'a mut dyn Chooser,
    pub user_id: &'a str,
    pub state: &'a mut ConversationState,
    pub metrics: TurnMetrics,
}

impl TurnRunner<'_> {
    /// Answer one user message and record it in history.
    pub(crate) fn run(&mut self, message: &str) -> Result<String> {
        let started = Instant::now();
        let (message_target, reply) = self.reply_at(message, 0)?;

        let topic = self.db.topic(self.state.topic());
        let global = self.substitutions;
        let reply_target = Target::with_substitutions(&reply, |word| substitute(topic, global, word));
        self.state.push_history(message_target, reply_target);

        self.metrics.total = started.elapsed();
        Ok(reply)
    }

    fn reply_at(&mut self, message: &str, depth: usize) -> Result<(Target, String)> {
        if depth > 0 && depth >= self.options.max_depth {
            return Err(Error::RecursionTooDeep { message: message.to_string(), limit: self.options.max_depth });
        }
        let started = Instant::now();

        let db = self.db;
        let topic_name = self.resolve_topic();
        let topic = db.topic(&topic_name);
        let global = self.substitutions;
        let target = Target::with_substitutions(message, |word| substitute(topic, global, word));

        let step = self.metrics.steps.len();
        self.metrics.steps.push(StepMetrics {
            depth,
            message: message.to_string(),
            normalized: target.normalized().to_string(),
            topic: topic_name.clone(),
            ..StepMetrics::default()
        });

        let mut considered = 0;
        let mut found = None;
        for rule in topic.into_iter().flat_map(Topic::sorted_rules) {
            considered += 1;
            let vars = VariableScopes {
                user: Some(self.state.variables()),
                bot: Some(&*self.bot_vars),
                alternates: Some(rule.alternates()),
            };
            let matched = rule
                .matches(&target, self.state.last_reply(), &vars)
                .map_err(|source| Error::Match { rule: rule.name().to_string(), source })?;
            if let Some(matched) = matched {
                found = Some((rule, matched));
                break;
            }
        }
        self.metrics.steps[step].rules_considered = considered;

        let reply = match found {
            Some((rule, matched)) => {
                debug!("{:?} matched {} in topic {topic_name:?} at depth {depth}", target.normalized(), rule.name());
                self.metrics.steps[step].rule = Some(rule.name().to_string());
                let text = self.invoke(rule, &matched, depth)?;
                self.expand(&text, depth)?
            }
            None => {
                debug!("nothing in topic {topic_name:?} matched {:?}", target.normalized());
                String::new()
            }
        };

        self.metrics.steps[step].duration = started.elapsed();
        Ok((target, reply))
    }

    /// The user's topic, reset to the default one if it no longer exists.
    fn resolve_topic(&mut self) -> String {
        if !self.db.has_topic(self.state.topic()) {
            warn!(
                "user {} is in missing topic {:?}, falling back to {:?}",
                self.user_id,
                self.state.topic(),
                self.options.default_topic
            );
            self.state.set_topic(self.options.default_topic.clone());
        }
        self.state.topic().to_string()
    }

    fn invoke(&mut self, rule: &Rule, matched: &Match, depth: usize) -> Result<String> {
        let (topic, user_vars) = self.state.parts_mut();
        let mut turn = Turn {
            user_id: self.user_id,
            rule: rule.name(),
            matched,
            topic,
            user_vars,
            bot_vars: &mut *self.bot_vars,
            depth,
        };
        let reply = (rule.handler())(&mut turn)
            .map_err(|source| Error::Handler { rule: rule.name().to_string(), source })?;
        let chosen = self.chooser.choose(reply);
        matched
            .render(&chosen)
            .map_err(|placeholder| Error::Template { rule: rule.name().to_string(), placeholder })
    }

    /// Replace every `<text>` in `reply` with the answer to `text`.
    fn expand(&mut self, reply: &str, depth: usize) -> Result<String> {
        let references: Vec<(Range<usize>, String)> = regex!(r"<([^<>]+)>")
            .captures_iter(reply)
            .filter_map(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str().to_string())))
            .collect();
        if references.is_empty() {
            return Ok(reply.to_string());
        }

        let mut expanded = reply.to_string();
        for (range, inner) in references.into_iter().rev() {
            debug!("expanding <{inner}> at depth {}", depth + 1);
            let (_, answer) = self.reply_at(&inner, depth + 1)?;
            expanded.replace_range(range, &answer);
        }
        Ok(expanded)
    }
}

/// Topic dictionary first, then the engine-wide one.
fn substitute<'s>(topic: Option<&'s Topic>, global: &'s HashMap<String, String>, word: &str) -> Option<&'s str> {
    topic.and_then(|t| t.substitution(word)).or_else(|| global.get(word).map(String::as_str))
}
