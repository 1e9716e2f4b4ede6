//! Reply selection.
//!
//! Handlers may offer several candidate replies; a [`Chooser`] turns that into
//! the one string the engine renders. The default picks at random, and tests
//! seed it (or pass a closure) to stay deterministic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Pick one uniformly.
    Choices(Vec<String>),
    /// Pick one proportionally to its weight; a weight of 0 counts as 1.
    Weighted(Vec<(String, u32)>),
}

impl Reply {
    /// The "no answer" reply.
    pub fn empty() -> Reply {
        Reply::Text(String::new())
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<Vec<&str>> for Reply {
    fn from(choices: Vec<&str>) -> Self {
        Reply::Choices(choices.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Reply {
    fn from(choices: Vec<String>) -> Self {
        Reply::Choices(choices)
    }
}

impl From<Vec<(&str, u32)>> for Reply {
    fn from(choices: Vec<(&str, u32)>) -> Self {
        Reply::Weighted(choices.into_iter().map(|(s, w)| (s.to_string(), w)).collect())
    }
}

/// Strategy for resolving a [`Reply`] to one string.
pub trait Chooser: Send {
    fn choose(&mut self, reply: Reply) -> String;
}

impl<F> Chooser for F
where
    F: FnMut(Reply) -> String + Send,
{
    fn choose(&mut self, reply: Reply) -> String {
        self(reply)
    }
}

/// Random choice over any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomChooser<R = StdRng> {
    rng: R,
}

impl RandomChooser<StdRng> {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        RandomChooser { rng: StdRng::from_os_rng() }
    }

    /// Reproducible choices.
    pub fn seeded(seed: u64) -> Self {
        RandomChooser { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RandomChooser<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomChooser<R> {
    pub fn with_rng(rng: R) -> Self {
        RandomChooser { rng }
    }
}

impl<R: Rng + Send> Chooser for RandomChooser<R> {
    fn choose(&mut self, reply: Reply) -> String {
        match reply {
            Reply::Text(text) => text,
            Reply::Choices(mut choices) => {
                if choices.is_empty() {
                    return String::new();
                }
                let i = self.rng.random_range(0..choices.len());
                choices.swap_remove(i)
            }
            Reply::Weighted(mut choices) => {
                let total: u64 = choices.iter().map(|(_, w)| u64::from((*w).max(1))).sum();
                if total == 0 {
                    return String::new();
                }
                let mut pick = self.rng.random_range(0..total);
                let mut chosen = choices.len() - 1;
                for (i, (_, weight)) in choices.iter().enumerate() {
                    let weight = u64::from((*weight).max(1));
                    if pick < weight {
                        chosen = i;
                        break;
                    }
                    pick -= weight;
                }
                choices.swap_remove(chosen).0
            }
        }
    }
}
