//! Rule database and reply engine.
//!
//! ## How the parts work together
//!
//! ```text
//! Vec<Script> ──┐
//!               │  RuleDatabase::register        (database.rs)
//!               │   - compile alternates (simple mode)
//!               │   - compile patterns, try to build matchers
//!               │   - dedup by RuleKey            (dedup.rs)
//!               └───────────────┬──────────────
//!                               │
//! message ── Target::new ───────┼─ normalized text   (target.rs)
//!                               v
//!                     TurnRunner::reply_at  (reply.rs)
//!                       - resolve topic (fallback to default)
//!                       - walk topic's sorted rules
//!                       - Rule::matches          (matching.rs)
//!                       - handler -> Chooser -> template
//!                       - expand <references> recursively
//!                               │
//!                               v
//!                  reply text + history push     (state.rs)
//! ```
//!
//! Ranking is computed once per topic and cached: weight first, then pattern
//! score, then previous-pattern score, all descending; equal keys keep
//! registration order.
//!
//! The database is immutable once built apart from lazily filled caches (sorted
//! rule lists and deferred matchers), both behind `OnceCell`. Reloading rules
//! means building a new database and swapping it in.

#[path = "engine/database.rs"]
mod database;
#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/matching.rs"]
mod matching;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/reply.rs"]
mod reply;
#[path = "engine/state.rs"]
mod state;
#[path = "engine/target.rs"]
mod target;


pub use database::{Handler, HandlerError, Rule, RuleDatabase, RuleSpec, Script};
pub use dedup::{DuplicateRule, RuleKey};
pub use matching::Match;
pub(crate) use metrics::{StepMetrics, TurnMetrics};
pub(crate) use reply::TurnRunner;
pub use reply::Turn;
pub use state::ConversationState;
pub use target::Target;
