//! Rule data model: pattern, response, score, and usage stats.
//!
//! Rules are the persisted unit of learned behavior. Pattern and response
//! are immutable after creation; score and stats are only touched by the
//! score updater.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::score::ScorePolicy;

/// Lowercase and collapse all whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A matchable condition over a query.
///
/// Two forms, distinguished by the presence of `+`:
/// - `"refund + policy"`: every `+`-separated keyword must appear (AND)
/// - `"hello hi greetings"`: any whitespace-separated keyword may appear (OR)
///
/// Evaluation is deterministic and side-effect-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern(String);

impl Pattern {
    /// Build a pattern from raw text, normalizing case and whitespace.
    pub fn new(raw: &str) -> Self {
        Pattern(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the pattern has no usable keywords.
    pub fn is_empty(&self) -> bool {
        if self.0.contains('+') {
            !self.0.split('+').any(|k| !k.trim().is_empty())
        } else {
            self.0.trim().is_empty()
        }
    }

    /// Canonical form used for duplicate detection across the repository.
    pub fn normalized(&self) -> String {
        normalize(&self.0)
    }

    /// Evaluate the predicate against an already-normalized query.
    pub fn matches(&self, normalized_query: &str) -> bool {
        let text = self.0.to_lowercase();
        if text.contains('+') {
            let mut keywords = text.split('+').map(str::trim).filter(|k| !k.is_empty());
            let mut any = false;
            let all = keywords.all(|k| {
                any = true;
                normalized_query.contains(k)
            });
            any && all
        } else {
            text.split_whitespace()
                .any(|k| normalized_query.contains(k))
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Usage counters for a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStats {
    /// Times the rule fired and received feedback.
    pub times_matched: u64,
    /// Times the rule was rated positive.
    pub times_positive: u64,
    /// Times the rule was rated negative.
    pub times_negative: u64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl RuleStats {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            times_matched: 0,
            times_positive: 0,
            times_negative: 0,
            created_at: now,
            last_used: now,
        }
    }
}

/// A persisted (pattern, response, score, stats) record usable to answer
/// queries symbolically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique, stable identifier. Assigned at creation, never reused.
    pub id: String,
    pub pattern: Pattern,
    pub response: String,
    /// Bounded confidence value; higher is preferred during ranking.
    pub score: f64,
    pub stats: RuleStats,
}

impl Rule {
    /// Create a rule with a fresh id and zeroed stats.
    pub fn new(pattern: Pattern, response: impl Into<String>, score: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            pattern,
            response: response.into(),
            score,
            stats: RuleStats::new(now),
        }
    }

    /// Historical success rate in [0, 1]; 0.5 for unrated rules.
    pub fn success_rate(&self) -> f64 {
        let rated = self.stats.times_positive + self.stats.times_negative;
        if rated == 0 {
            0.5
        } else {
            self.stats.times_positive as f64 / rated as f64
        }
    }

    /// Check the rule invariants against the score policy bounds.
    pub fn validate(&self, policy: &ScorePolicy) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("rule has an empty id".to_string());
        }
        if self.pattern.is_empty() {
            return Err(format!("rule {} has an empty pattern", self.id));
        }
        if self.response.trim().is_empty() {
            return Err(format!("rule {} has an empty response", self.id));
        }
        if !self.score.is_finite() || self.score < policy.min || self.score > policy.max {
            return Err(format!(
                "rule {} has score {} outside [{}, {}]",
                self.id, self.score, policy.min, policy.max
            ));
        }
        Ok(())
    }
}
