//! Reply run metrics.
//!
//! Collected on every run and cheap enough to keep on the normal path; the
//! public API only surfaces them through `Engine::reply_verbose`.
//!
//! One `StepMetrics` is recorded per call into the reply runner, including
//! the nested calls made to expand `<references>`. Steps are stored in the
//! order the calls started, so a parent always precedes its sub-replies.

use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub(crate) struct TurnMetrics {
    /// Total elapsed time for the whole turn.
    pub total: Duration,
    pub steps: Vec<StepMetrics>,
}

/// Timing and outcome of a single reply call.
#[derive(Debug, Default, Clone)]
pub(crate) struct StepMetrics {
    /// Recursion depth; 0 for the user's own message.
    pub depth: usize,
    pub message: String,
    pub normalized: String,
    /// Topic the call resolved to, after any fallback.
    pub topic: String,
    /// Name of the rule that answered, if any.
    pub rule: Option<String>,
    /// Number of rules tried, the answering one included.
    pub rules_considered: usize,
    /// Elapsed time, sub-replies included.
    pub duration: Duration,
}
