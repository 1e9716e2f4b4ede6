//! Rule registration and per-topic ordering.
//!
//! A `RuleDatabase` is built in one shot from a batch of scripts and is never
//! mutated afterwards, apart from two lazily filled caches:
//!
//! - each `Pattern` caches its matcher the first time it can be built;
//! - each `Topic` caches its ranked rule order on first use.
//!
//! ## Registration
//!
//! For every script, in order:
//!
//! 1. Compile the script's alternates in simple mode; store each one's
//!    canonical text as the `%a:` value seen by that script's rules.
//! 2. Merge the script's substitutions into its topic's dictionary.
//! 3. For every rule: parse pattern and previous-pattern (a failure aborts the
//!    whole batch, naming `script.rule`), try to build the matchers with the
//!    bot variables known now (variable problems defer the build, a regex the
//!    engine rejects aborts the batch), then insert it unless its `RuleKey` is
//!    already taken in that topic.
//!
//! ## Invariants
//!
//! - The default topic always exists, even when no script names it.
//! - `Topic::index` maps every key to a position in `Topic::rules`.
//! - Ranked order is a stable sort: equal `(weight, score, previous score)`
//!   keeps registration order, so identical input always picks the same rule.

use super::dedup::{DuplicateRule, RuleKey};
use super::reply::Turn;
use crate::choose::Reply;
use crate::error::{Error, PatternError, PatternSlot, Result};
use crate::pattern::{EMPTY_SCORE, Mode, Pattern};
use crate::{DEFAULT_TOPIC, Value, VariableScopes, Variables};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error type handlers may return; wrapped into [`Error::Handler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Reply callback of a rule.
pub type Handler = Arc<dyn Fn(&mut Turn<'_>) -> std::result::Result<Reply, HandlerError> + Send + Sync>;

// --- Authoring ---------------------------------------------------------------

/// One authored rule, before compilation.
pub struct RuleSpec {
    name: String,
    pattern: String,
    previous: Option<String>,
    weight: i32,
    handler: Handler,
}

impl RuleSpec {
    pub fn new<F>(name: impl Into<String>, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Turn<'_>) -> std::result::Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Self::with_handler(name, pattern, Arc::new(handler))
    }

    /// Like [`RuleSpec::new`], sharing an existing handler.
    pub fn with_handler(name: impl Into<String>, pattern: impl Into<String>, handler: Handler) -> Self {
        RuleSpec { name: name.into(), pattern: pattern.into(), previous: None, weight: 1, handler }
    }

    /// Require the bot's last reply to match `pattern`.
    pub fn previous(mut self, pattern: impl Into<String>) -> Self {
        self.previous = Some(pattern.into());
        self
    }

    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSpec")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("previous", &self.previous)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// A unit of rule supply: rules sharing a topic, alternates and substitutions.
#[derive(Debug)]
pub struct Script {
    name: String,
    topic: String,
    alternates: Vec<(String, String)>,
    substitutions: HashMap<String, String>,
    rules: Vec<RuleSpec>,
}

impl Script {
    /// A script in the default topic.
    pub fn new(name: impl Into<String>) -> Self {
        Script {
            name: name.into(),
            topic: DEFAULT_TOPIC.to_string(),
            alternates: Vec::new(),
            substitutions: HashMap::new(),
            rules: Vec::new(),
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Declare `%a:name`. `text` uses the simple grammar: words, groups and
    /// optionals only.
    pub fn alternate(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.alternates.push((name.into(), text.into()));
        self
    }

    /// Replace the word `word` with `phrase` while normalizing messages in
    /// this script's topic.
    pub fn substitute(mut self, word: impl Into<String>, phrase: impl Into<String>) -> Self {
        self.substitutions.insert(word.into().to_lowercase(), phrase.into());
        self
    }

    pub fn rule(mut self, spec: RuleSpec) -> Self {
        self.rules.push(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// --- Compiled rules ----------------------------------------------------------

/// A registered rule.
pub struct Rule {
    name: String,
    pattern: Pattern,
    previous: Option<Pattern>,
    weight: i32,
    handler: Handler,
    alternates: Arc<Variables>,
}

impl Rule {
    fn compile(name: String, spec: RuleSpec, alternates: Arc<Variables>, bot: &Variables) -> Result<Rule> {
        let pattern = Pattern::parse(&spec.pattern)
            .map_err(|source| Error::Rule { rule: name.clone(), slot: PatternSlot::Pattern, source })?;
        let previous = spec
            .previous
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(Pattern::parse)
            .transpose()
            .map_err(|source| Error::Rule { rule: name.clone(), slot: PatternSlot::Previous, source })?;

        let rule = Rule { name, pattern, previous, weight: spec.weight, handler: spec.handler, alternates };
        rule.prebuild(bot)?;
        Ok(rule)
    }

    /// Try to build both matchers now.
    ///
    /// Variable trouble (missing, non-text or malformed value) is retried at
    /// match time, since the value may change before then. A generated regex
    /// the engine rejects will be rejected again, so that fails registration.
    fn prebuild(&self, bot: &Variables) -> Result<()> {
        let scopes = VariableScopes { user: None, bot: Some(bot), alternates: Some(&self.alternates) };
        let slots = [(PatternSlot::Pattern, Some(&self.pattern)), (PatternSlot::Previous, self.previous.as_ref())];
        for (slot, pattern) in slots {
            let Some(pattern) = pattern else { continue };
            match pattern.matcher(&scopes) {
                Ok(Some(_)) => {}
                Ok(None) => debug!("{slot} of {} deferred: unresolved variable", self.name),
                Err(source @ PatternError::Regex { .. }) => {
                    return Err(Error::Rule { rule: self.name.clone(), slot, source });
                }
                Err(e) => debug!("{slot} of {} deferred: {e}", self.name),
            }
        }
        Ok(())
    }

    /// Qualified name, `script.rule`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn previous(&self) -> Option<&Pattern> {
        self.previous.as_ref()
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn previous_score(&self) -> i32 {
        self.previous.as_ref().map_or(EMPTY_SCORE, Pattern::score)
    }

    pub fn key(&self) -> RuleKey {
        RuleKey::new(self.pattern.canonical(), self.previous.as_ref().map(Pattern::canonical))
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    pub(crate) fn alternates(&self) -> &Variables {
        &self.alternates
    }

    fn rank(&self) -> (i32, i32, i32) {
        (self.weight, self.pattern.score(), self.previous_score())
    }

    fn shares_handler(&self, other: &Rule) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.handler), Arc::as_ptr(&other.handler))
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.canonical())
            .field("previous", &self.previous.as_ref().map(Pattern::canonical))
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

// --- Topics ------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct Topic {
    name: String,
    rules: Vec<Rule>,
    index: HashMap<RuleKey, usize>,
    substitutions: HashMap<String, String>,
    sorted: OnceCell<Vec<usize>>,
}

impl Topic {
    fn new(name: &str) -> Self {
        Topic {
            name: name.to_string(),
            rules: Vec::new(),
            index: HashMap::new(),
            substitutions: HashMap::new(),
            sorted: OnceCell::new(),
        }
    }

    fn push(&mut self, key: RuleKey, rule: Rule) {
        self.index.insert(key, self.rules.len());
        self.rules.push(rule);
        self.sorted = OnceCell::new();
    }

    fn get(&self, key: &RuleKey) -> Option<&Rule> {
        self.index.get(key).map(|&i| &self.rules[i])
    }

    /// Rules in match order, highest rank first.
    pub(crate) fn sorted_rules(&self) -> impl Iterator<Item = &Rule> {
        let order = self.sorted.get_or_init(|| {
            let mut order: Vec<usize> = (0..self.rules.len()).collect();
            order.sort_by(|&a, &b| self.rules[b].rank().cmp(&self.rules[a].rank()));
            if log::log_enabled!(log::Level::Debug) {
                for (position, &i) in order.iter().enumerate() {
                    let rule = &self.rules[i];
                    debug!("topic {:?} #{position}: {} {:?}", self.name, rule.name, rule.rank());
                }
            }
            order
        });
        order.iter().map(|&i| &self.rules[i])
    }

    pub(crate) fn substitution(&self, word: &str) -> Option<&str> {
        self.substitutions.get(word).map(String::as_str)
    }
}

// --- Database ----------------------------------------------------------------

/// All topics of a loaded rule set.
#[derive(Debug)]
pub struct RuleDatabase {
    topics: HashMap<String, Topic>,
    duplicates: Vec<DuplicateRule>,
    bot_vars: Variables,
}

impl Default for RuleDatabase {
    fn default() -> Self {
        let topics = HashMap::from([(DEFAULT_TOPIC.to_string(), Topic::new(DEFAULT_TOPIC))]);
        RuleDatabase { topics, duplicates: Vec::new(), bot_vars: Variables::new() }
    }
}

impl RuleDatabase {
    /// An empty database holding only the default topic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and index a batch of scripts.
    ///
    /// `bot` is the bot variable table as it stands at load time; matchers
    /// that need anything else are built on first use.
    ///
    /// Fails on the first malformed pattern or alternate, on a pattern whose
    /// matcher the regex engine refuses to build, or when the batch contains
    /// no rules at all. Duplicates are not errors; see
    /// [`RuleDatabase::duplicates`].
    pub fn register(batch: Vec<Script>, bot: &Variables) -> Result<RuleDatabase> {
        let mut db = RuleDatabase { bot_vars: bot.clone(), ..RuleDatabase::new() };
        let mut registered = 0;

        for script in batch {
            let Script { name: script_name, topic: topic_name, alternates, substitutions, rules } = script;
            let alternates = Arc::new(compile_alternates(&script_name, &alternates)?);

            let topic = db.topics.entry(topic_name.clone()).or_insert_with(|| Topic::new(&topic_name));
            topic.substitutions.extend(substitutions);

            for spec in rules {
                let qualified = format!("{script_name}.{}", spec.name);
                let rule = Rule::compile(qualified, spec, Arc::clone(&alternates), bot)?;
                registered += 1;

                let key = rule.key();
                match topic.get(&key) {
                    Some(kept) if kept.shares_handler(&rule) => {
                        debug!("rule {} registered twice in topic {topic_name:?}", rule.name);
                    }
                    Some(kept) => {
                        let duplicate = DuplicateRule {
                            topic: topic_name.clone(),
                            key,
                            kept: kept.name.clone(),
                            ignored: rule.name.clone(),
                        };
                        warn!("{duplicate}");
                        db.duplicates.push(duplicate);
                    }
                    None => topic.push(key, rule),
                }
            }
        }

        if registered == 0 {
            return Err(Error::NoRulesFound);
        }
        debug!("registered {registered} rules in {} topics", db.topics.len());
        Ok(db)
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }

    /// Topic names, sorted.
    pub fn topic_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.topics.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Rules of `topic` in match order; empty for an unknown topic.
    pub fn rules(&self, topic: &str) -> impl Iterator<Item = &Rule> {
        self.topics.get(topic).into_iter().flat_map(Topic::sorted_rules)
    }

    /// Number of active rules across all topics.
    pub fn rule_count(&self) -> usize {
        self.topics.values().map(|t| t.rules.len()).sum()
    }

    /// The bot variables matchers were built against at registration.
    pub fn bot_vars(&self) -> &Variables {
        &self.bot_vars
    }

    /// Rules dropped during registration, in the order they were seen.
    pub fn duplicates(&self) -> &[DuplicateRule] {
        &self.duplicates
    }

    /// Rank every topic now instead of on first match.
    pub fn sort_all(&self) {
        for topic in self.topics.values() {
            topic.sorted_rules().for_each(drop);
        }
    }

    pub(crate) fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }
}

fn compile_alternates(script: &str, alternates: &[(String, String)]) -> Result<Variables> {
    alternates
        .iter()
        .map(|(name, text)| {
            let pattern = Pattern::with_mode(text, Mode::Simple).map_err(|source| Error::Alternate {
                script: script.to_string(),
                name: name.clone(),
                source,
            })?;
            Ok((name.clone(), Value::Text(pattern.canonical().to_string())))
        })
        .collect()
}
