// src/git/messages.rs

use rand::Rng;
use rand::seq::IndexedRandom;

// Two tiers: throwaway one-worders and slightly more verbose filler. Both
// deliberately say nothing about what actually changed.
const PLAIN: &[&str] = &[
    "work", "...", "test", "pls", "wip", "fix", "oops", "doesn't work",
];

const DESCRIPTIVE: &[&str] = &[
    "made it work",
    "broke something",
    "this should work",
    "trying again",
    "one more time",
    "final attempt",
    "hopefully this works",
    "please work",
    "why not working",
    "working now",
    "finally",
    "got it",
    "cleanup",
    "adding feat",
];

/// Bank of generic commit messages for synthesized history.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommitMessageBank;

impl CommitMessageBank {
    pub fn new() -> Self {
        Self
    }

    /// 70% plain, 30% descriptive.
    pub fn random_message(&self) -> String {
        let mut rng = rand::rng();
        let pool = if rng.random::<f64>() < 0.7 { PLAIN } else { DESCRIPTIVE };
        pool.choose(&mut rng).copied().unwrap_or("work").to_string()
    }

    /// A sequence of `count` messages, avoiding duplicates while the bank
    /// still has unused entries.
    pub fn sequence(&self, count: usize) -> Vec<String> {
        let mut messages = Vec::with_capacity(count);
        let mut used = std::collections::HashSet::new();
        for _ in 0..count {
            let mut picked = self.random_message();
            for _ in 0..10 {
                if used.insert(picked.clone()) || used.len() >= PLAIN.len() + DESCRIPTIVE.len() {
                    break;
                }
                picked = self.random_message();
            }
            messages.push(picked);
        }
        messages
    }
}
