//! In-memory rule collection with write-through persistence.
//!
//! The repository owns the store and the score updater. Every mutation is a
//! single read-modify-write followed by exactly one full-collection save;
//! a failed save rolls the in-memory change back so memory and disk never
//! disagree about committed state.

use tracing::{error, info, warn};

use crate::error::{AgentError, StoreError};
use crate::store::RuleStore;

use super::matcher;
use super::rule::Rule;
use super::score::{ScorePolicy, ScoreUpdater, Sentiment};

pub struct RuleRepository {
    rules: Vec<Rule>,
    store: Box<dyn RuleStore>,
    updater: ScoreUpdater,
}

impl RuleRepository {
    /// Create an empty repository over a store. Call [`load`](Self::load)
    /// to populate it from the persisted snapshot.
    pub fn new(store: Box<dyn RuleStore>, policy: ScorePolicy) -> Self {
        Self {
            rules: Vec::new(),
            store,
            updater: ScoreUpdater::new(policy),
        }
    }

    /// Populate in-memory state from the store snapshot.
    ///
    /// A corrupt or invalid snapshot empties the repository and returns the
    /// corruption error so the caller can surface a warning; it never
    /// aborts the session. Learned rules on disk are left untouched.
    pub fn load(&mut self) -> Result<usize, StoreError> {
        let rules = match self.store.load() {
            Ok(rules) => rules,
            Err(err) => {
                warn!("falling back to an empty rule collection: {}", err);
                self.rules = Vec::new();
                return Err(err);
            }
        };

        if let Err(reason) = validate_snapshot(&rules, self.updater.policy()) {
            warn!("falling back to an empty rule collection: {}", reason);
            self.rules = Vec::new();
            return Err(StoreError::Corrupt(reason));
        }

        info!("loaded {} rules", rules.len());
        self.rules = rules;
        Ok(self.rules.len())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn policy(&self) -> &ScorePolicy {
        self.updater.policy()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// All rules matching the query, in insertion order. Pure.
    pub fn find_all_matching(&self, query: &str) -> Vec<&Rule> {
        matcher::find_matching(query, &self.rules)
    }

    /// Best-ranked matching rule for the query. Pure.
    pub fn select_best(&self, query: &str) -> Option<&Rule> {
        matcher::select_best(query, &self.rules)
    }

    /// Insert a new rule and persist the collection.
    ///
    /// Rejects id collisions (a synthesizer defect), pattern duplicates,
    /// and rules failing validation. Nothing is persisted on rejection.
    pub fn add(&mut self, rule: Rule) -> Result<(), AgentError> {
        if self.rules.iter().any(|r| r.id == rule.id) {
            error!("rule id collision on add: {}", rule.id);
            return Err(AgentError::DuplicateId(rule.id));
        }

        let key = rule.pattern.normalized();
        if self.rules.iter().any(|r| r.pattern.normalized() == key) {
            return Err(AgentError::SynthesisValidation(format!(
                "pattern '{}' duplicates an existing rule",
                rule.pattern
            )));
        }

        if let Err(reason) = rule.validate(self.updater.policy()) {
            return Err(AgentError::SynthesisValidation(reason));
        }

        self.rules.push(rule);
        if let Err(err) = self.store.save(&self.rules) {
            self.rules.pop();
            return Err(err.into());
        }
        Ok(())
    }

    /// Apply feedback to a rule's score and stats, then persist.
    ///
    /// Atomic: a failed save restores the previous rule state.
    pub fn apply_feedback(&mut self, id: &str, sentiment: Sentiment) -> Result<f64, AgentError> {
        let index = match self.rules.iter().position(|r| r.id == id) {
            Some(index) => index,
            None => {
                error!("feedback for unknown rule id: {}", id);
                return Err(AgentError::NotFound(id.to_string()));
            }
        };

        let before = self.rules[index].clone();
        let new_score = self.updater.apply(&mut self.rules[index], sentiment);

        if let Err(err) = self.store.save(&self.rules) {
            self.rules[index] = before;
            return Err(err.into());
        }
        Ok(new_score)
    }
}

fn validate_snapshot(rules: &[Rule], policy: &ScorePolicy) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        rule.validate(policy)?;
        if !seen.insert(rule.id.as_str()) {
            return Err(format!("duplicate rule id in snapshot: {}", rule.id));
        }
    }
    Ok(())
}
