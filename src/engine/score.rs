//! Score adjustment policy applied in response to feedback.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::rule::Rule;

/// User judgment of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
}

/// Bounds and step sizes for rule scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorePolicy {
    /// Lower clamp. Keeps a bad streak from disqualifying a rule forever.
    #[serde(default = "default_score_min")]
    pub min: f64,
    /// Upper clamp. Keeps one rule from running away with every query.
    #[serde(default = "default_score_max")]
    pub max: f64,
    #[serde(default = "default_score_increment")]
    pub increment: f64,
    #[serde(default = "default_score_decrement")]
    pub decrement: f64,
    /// Starting score for synthesized rules; below what repeated positive
    /// feedback can earn, so new rules must prove themselves.
    #[serde(default = "default_score_baseline")]
    pub baseline: f64,
}

fn default_score_min() -> f64 {
    0.0
}

fn default_score_max() -> f64 {
    10.0
}

fn default_score_increment() -> f64 {
    1.0
}

fn default_score_decrement() -> f64 {
    1.0
}

fn default_score_baseline() -> f64 {
    2.0
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            min: default_score_min(),
            max: default_score_max(),
            increment: default_score_increment(),
            decrement: default_score_decrement(),
            baseline: default_score_baseline(),
        }
    }
}

/// Applies feedback to a rule's score and stats. Total for any valid rule.
#[derive(Debug, Clone)]
pub struct ScoreUpdater {
    policy: ScorePolicy,
}

impl ScoreUpdater {
    pub fn new(policy: ScorePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScorePolicy {
        &self.policy
    }

    /// Adjust the score per sentiment, clamped to the policy bounds.
    /// Stats counters and the last-used timestamp update unconditionally.
    pub fn apply(&self, rule: &mut Rule, sentiment: Sentiment) -> f64 {
        rule.stats.times_matched += 1;
        rule.stats.last_used = Utc::now();
        rule.score = match sentiment {
            Sentiment::Positive => {
                rule.stats.times_positive += 1;
                (rule.score + self.policy.increment).min(self.policy.max)
            }
            Sentiment::Negative => {
                rule.stats.times_negative += 1;
                (rule.score - self.policy.decrement).max(self.policy.min)
            }
        };
        rule.score
    }
}
