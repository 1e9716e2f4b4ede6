use crate::engine::{ConversationState, RuleDatabase, StepMetrics, Target, TurnMetrics, TurnRunner};
use crate::{Chooser, DEFAULT_TOPIC, RandomChooser, Result, Variables};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Deepest `<reference>` nesting allowed before a turn fails with
    /// [`Error::RecursionTooDeep`](crate::Error::RecursionTooDeep).
    pub max_depth: usize,
    /// Number of `(message, reply)` pairs kept per user.
    pub history_capacity: usize,
    /// Topic new users start in, and the fallback for missing topics.
    pub default_topic: String,
}

impl Default for Options {
    fn default() -> Self {
        Options { max_depth: 50, history_capacity: 10, default_topic: DEFAULT_TOPIC.to_string() }
    }
}

/// One reply call inside a turn, as reported by [`Engine::reply_verbose`].
#[derive(Debug, Clone)]
pub struct ReplyStep {
    pub depth: usize,
    /// The message text, shortened for display.
    pub message: String,
    pub normalized: String,
    pub topic: String,
    /// Rule that answered, if any.
    pub rule: Option<String>,
    pub rules_considered: usize,
    pub duration: Duration,
}

/// Trace of a whole turn.
#[derive(Debug, Clone)]
pub struct ReplyDetails {
    pub total: Duration,
    /// Calls in the order they started; sub-replies follow their parent.
    pub steps: Vec<ReplyStep>,
}

/// Result from [`Engine::reply_verbose`].
#[derive(Debug, Clone)]
pub struct ReplyVerbose {
    pub message: String,
    pub reply: String,
    pub details: ReplyDetails,
}

/// A rule database plus everything that changes while talking: bot
/// variables and one [`ConversationState`] per user.
///
/// # Example
/// ```
/// use rejoinder::{Engine, Options, Reply, RuleDatabase, Script, Variables, rule};
///
/// let script = Script::new("greetings").rule(rule! {
///     name: "hello",
///     pattern: "(hello|hi) [there]",
///     reply: |_turn| { Ok(Reply::from("Hello, human.")) },
/// });
/// let db = RuleDatabase::register(vec![script], &Variables::new()).unwrap();
/// let mut engine = Engine::new(db, Options::default());
///
/// assert_eq!(engine.reply("alice", "Hi there!").unwrap(), "Hello, human.");
/// assert_eq!(engine.reply("alice", "what?").unwrap(), "");
/// ```
pub struct Engine {
    rules: Arc<RuleDatabase>,
    options: Options,
    bot_vars: Variables,
    substitutions: HashMap<String, String>,
    users: HashMap<String, ConversationState>,
    chooser: Box<dyn Chooser>,
    on_new_user: Option<NewUserHook>,
}

/// Called with the user id and fresh state the first time a user is seen.
pub type NewUserHook = Box<dyn Fn(&str, &mut ConversationState) + Send + Sync>;

impl Engine {
    /// An engine over `rules`.
    ///
    /// Bot variables start as the table the database was registered with, so
    /// `%b:` matchers built at registration agree with what handlers see.
    pub fn new(rules: impl Into<Arc<RuleDatabase>>, options: Options) -> Self {
        let rules = rules.into();
        Engine {
            bot_vars: rules.bot_vars().clone(),
            rules,
            options,
            substitutions: HashMap::new(),
            users: HashMap::new(),
            chooser: Box::new(RandomChooser::new()),
            on_new_user: None,
        }
    }

    /// Prepare every new user's state, e.g. seed user variables that `%u:`
    /// patterns depend on.
    pub fn on_new_user(mut self, hook: impl Fn(&str, &mut ConversationState) + Send + Sync + 'static) -> Self {
        self.on_new_user = Some(Box::new(hook));
        self
    }

    /// Replace the default random chooser.
    pub fn with_chooser(mut self, chooser: impl Chooser + 'static) -> Self {
        self.chooser = Box::new(chooser);
        self
    }

    /// Replace the starting bot variables. Matchers already built from the
    /// registration table keep the values they were built with.
    pub fn with_bot_vars(mut self, bot_vars: Variables) -> Self {
        self.bot_vars = bot_vars;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn rules(&self) -> &Arc<RuleDatabase> {
        &self.rules
    }

    /// Install a freshly built database and return the old one.
    ///
    /// Users whose topic disappeared are moved to the default topic on their
    /// next message.
    pub fn swap_rules(&mut self, rules: impl Into<Arc<RuleDatabase>>) -> Arc<RuleDatabase> {
        std::mem::replace(&mut self.rules, rules.into())
    }

    /// Answer `message` from `user_id`.
    ///
    /// An empty string means no rule matched.
    pub fn reply(&mut self, user_id: &str, message: &str) -> Result<String> {
        self.run(user_id, message).map(|(reply, _)| reply)
    }

    /// Like [`Engine::reply`], with a per-call trace.
    pub fn reply_verbose(&mut self, user_id: &str, message: &str) -> Result<ReplyVerbose> {
        let (reply, metrics) = self.run(user_id, message)?;
        let details = ReplyDetails { total: metrics.total, steps: metrics.steps.iter().map(step_summary).collect() };
        Ok(ReplyVerbose { message: message.to_string(), reply, details })
    }

    fn run(&mut self, user_id: &str, message: &str) -> Result<(String, TurnMetrics)> {
        let options = &self.options;
        let state = user_state(&mut self.users, options, self.on_new_user.as_ref(), user_id);
        let mut runner = TurnRunner {
            db: &self.rules,
            options,
            substitutions: &self.substitutions,
            bot_vars: &mut self.bot_vars,
            chooser: self.chooser.as_mut(),
            user_id,
            state,
            metrics: TurnMetrics::default(),
        };
        let reply = runner.run(message)?;
        Ok((reply, runner.metrics))
    }

    pub fn bot_vars(&self) -> &Variables {
        &self.bot_vars
    }

    pub fn bot_vars_mut(&mut self) -> &mut Variables {
        &mut self.bot_vars
    }

    /// State of a user seen before.
    pub fn user(&self, user_id: &str) -> Option<&ConversationState> {
        self.users.get(user_id)
    }

    /// State of a user, created in the default topic if new.
    pub fn user_mut(&mut self, user_id: &str) -> &mut ConversationState {
        user_state(&mut self.users, &self.options, self.on_new_user.as_ref(), user_id)
    }

    /// Current topic of a user; the default topic for unknown users.
    pub fn topic(&self, user_id: &str) -> &str {
        self.user(user_id).map_or(self.options.default_topic.as_str(), ConversationState::topic)
    }

    pub fn set_topic(&mut self, user_id: &str, topic: impl Into<String>) {
        self.user_mut(user_id).set_topic(topic);
    }

    /// The user's last `(message, reply)` pairs, most recent first.
    pub fn history(&self, user_id: &str) -> Vec<&(Target, Target)> {
        self.user(user_id).map(|state| state.history().collect()).unwrap_or_default()
    }

    /// Drop everything known about a user.
    pub fn forget(&mut self, user_id: &str) -> Option<ConversationState> {
        self.users.remove(user_id)
    }

    /// Engine-wide word substitutions, used after the topic's own.
    pub fn set_substitutions(&mut self, substitutions: HashMap<String, String>) {
        self.substitutions = substitutions.into_iter().map(|(word, phrase)| (word.to_lowercase(), phrase)).collect();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.rules.rule_count())
            .field("options", &self.options)
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

fn user_state<'u>(
    users: &'u mut HashMap<String, ConversationState>,
    options: &Options,
    on_new_user: Option<&NewUserHook>,
    user_id: &str,
) -> &'u mut ConversationState {
    users.entry(user_id.to_string()).or_insert_with(|| {
        let mut state = ConversationState::new(options.default_topic.clone(), options.history_capacity);
        if let Some(hook) = on_new_user {
            hook(user_id, &mut state);
        }
        state
    })
}

fn step_summary(step: &StepMetrics) -> ReplyStep {
    ReplyStep {
        depth: step.depth,
        message: step.message.chars().take(80).collect(),
        normalized: step.normalized.clone(),
        topic: step.topic.clone(),
        rule: step.rule.clone(),
        rules_considered: step.rules_considered,
        duration: step.duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reply, RuleSpec, Script};

    fn engine(scripts: Vec<Script>) -> Engine {
        let db = RuleDatabase::register(scripts, &Variables::new()).unwrap();
        Engine::new(db, Options::default()).with_chooser(RandomChooser::seeded(1))
    }

    fn text(reply: &'static str) -> impl Fn(&mut crate::Turn<'_>) -> std::result::Result<Reply, crate::HandlerError> {
        move |_| Ok(Reply::from(reply))
    }

    #[test]
    fn reply_verbose_traces_nested_calls() {
        let mut e = engine(vec![Script::new("s")
            .rule(RuleSpec::new("outer", "start", text("a <inner>")))
            .rule(RuleSpec::new("inner", "inner", text("b")))]);

        let res = e.reply_verbose("u", "Start!").unwrap();
        assert_eq!(res.reply, "a b");
        assert_eq!(res.message, "Start!");

        let steps = &res.details.steps;
        assert_eq!(steps.len(), 2);
        assert_eq!((steps[0].depth, steps[0].rule.as_deref()), (0, Some("s.outer")));
        assert_eq!((steps[1].depth, steps[1].rule.as_deref()), (1, Some("s.inner")));
        assert_eq!(steps[0].normalized, "start");
        assert_eq!(steps[0].topic, "all");
        assert!(steps[0].duration >= steps[1].duration);
        assert!(res.details.total >= steps[0].duration);
    }

    #[test]
    fn unmatched_step_has_no_rule() {
        let mut e = engine(vec![Script::new("s").rule(RuleSpec::new("hi", "hi", text("hello")))]);
        let res = e.reply_verbose("u", "bye").unwrap();
        assert_eq!(res.reply, "");
        assert_eq!(res.details.steps[0].rule, None);
        assert_eq!(res.details.steps[0].rules_considered, 1);
    }

    #[test]
    fn swap_rules_moves_users_out_of_removed_topics() {
        let mut e = engine(vec![Script::new("s").topic("games").rule(RuleSpec::new("play", "play", text("ok")))]);
        e.set_topic("u", "games");
        assert_eq!(e.reply("u", "play").unwrap(), "ok");

        let next = RuleDatabase::register(
            vec![Script::new("t").rule(RuleSpec::new("play", "play", text("no games here")))],
            &Variables::new(),
        )
        .unwrap();
        let old = e.swap_rules(next);
        assert!(old.has_topic("games"));

        assert_eq!(e.reply("u", "play").unwrap(), "no games here");
        assert_eq!(e.topic("u"), "all");
    }

    #[test]
    fn engine_substitutions_apply_to_every_topic() {
        let mut e = engine(vec![Script::new("s").rule(RuleSpec::new("am", "i am here", text("welcome")))]);
        e.set_substitutions(HashMap::from([("I'm".to_string(), "i am".to_string())]));
        assert_eq!(e.reply("u", "I'm here").unwrap(), "welcome");
    }

    #[test]
    fn engine_starts_from_registration_bot_vars() {
        let bot = Variables::from([("name".to_string(), crate::Value::from("rejoinder"))]);
        let script = Script::new("s").rule(RuleSpec::new("name", "are you %b:name", |turn: &mut crate::Turn<'_>| {
            Ok(Reply::from(format!("yes, {}", turn.bot_vars()["name"])))
        }));
        let db = RuleDatabase::register(vec![script], &bot).unwrap();
        assert_eq!(db.bot_vars(), &bot);

        let mut e = Engine::new(db, Options::default());
        assert_eq!(e.bot_vars(), &bot);
        assert_eq!(e.reply("u", "Are you rejoinder?").unwrap(), "yes, rejoinder");
    }

    #[test]
    fn new_users_are_prepared_once() {
        let mut e = engine(vec![Script::new("s")
            .rule(RuleSpec::new("letter", "the letter is %u:letters", text("pass")))
            .rule(RuleSpec::new("star", "*", text("fail")))])
        .on_new_user(|user_id, state| {
            if user_id != "guest" {
                state.variables_mut().insert("letters".into(), crate::Value::from("(x|y|z)"));
            }
        });

        assert_eq!(e.reply("guest", "The letter is y").unwrap(), "fail");
        assert_eq!(e.reply("local", "The letter is y").unwrap(), "pass");

        e.user_mut("local").variables_mut().insert("letters".into(), crate::Value::from("(a|b)"));
        e.reply("local", "hello").unwrap();
        assert_eq!(e.user("local").unwrap().variables()["letters"], crate::Value::from("(a|b)"));
    }

    #[test]
    fn unknown_users_read_defaults() {
        let mut e = engine(vec![Script::new("s").rule(RuleSpec::new("hi", "hi", text("hello")))]);
        assert_eq!(e.topic("nobody"), "all");
        assert!(e.history("nobody").is_empty());
        assert!(e.user("nobody").is_none());

        e.reply("somebody", "hi").unwrap();
        assert_eq!(e.history("somebody").len(), 1);
        assert!(e.forget("somebody").is_some());
        assert!(e.user("somebody").is_none());
    }
}
