//! Turn orchestration: match, respond, collect feedback, learn.
//!
//! The agent owns the repository and the model capability. One turn runs
//! query -> response -> feedback; all repository mutation happens when
//! feedback is applied, so a turn abandoned mid-way leaves no trace.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::AgentError;
use crate::llm::LanguageModel;

use super::repository::RuleRepository;
use super::rule::{Pattern, Rule};
use super::score::Sentiment;
use super::synthesis::RuleSynthesizer;

const SEED_PATTERN: &str = "hello hi greetings";
const SEED_RESPONSE: &str = "Hello! How can I help you today?";
const SEED_SCORE: f64 = 5.0;

/// How a turn's response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    AnsweredByRule,
    AnsweredByFallback,
}

impl std::fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnStatus::AnsweredByRule => write!(f, "answered-by-rule"),
            TurnStatus::AnsweredByFallback => write!(f, "answered-by-fallback"),
        }
    }
}

/// Per-query context carried from match to feedback.
///
/// Feedback references this exact turn, never a re-lookup by query, so a
/// repository that changed in between cannot misdirect the update.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: String,
    pub query: String,
    pub response: String,
    /// The rule that produced the response, when one fired.
    pub rule_id: Option<String>,
    pub status: TurnStatus,
}

/// What applying feedback did.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    /// A rule's score went up.
    ScoreRaised(f64),
    /// A rule's score went down.
    ScoreLowered(f64),
    /// A new rule was learned from the correction; carries its id.
    RuleSynthesized(String),
    /// Feedback recorded with nothing to change (fallback response, no
    /// correction supplied).
    Noted,
}

/// Aggregate statistics over the rule collection and session history.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStats {
    pub total_rules: usize,
    /// Rules whose positive ratings outweigh their negative ones.
    pub proven_rules: usize,
    pub turns: usize,
    pub rule_hits: usize,
}

impl AgentStats {
    pub fn rule_hit_ratio(&self) -> f64 {
        if self.turns == 0 {
            0.0
        } else {
            self.rule_hits as f64 / self.turns as f64
        }
    }
}

pub struct Agent {
    repository: RuleRepository,
    model: Arc<dyn LanguageModel>,
    synthesizer: RuleSynthesizer,
    seed_rules: bool,
    history: Vec<Turn>,
}

impl Agent {
    pub fn new(
        repository: RuleRepository,
        model: Arc<dyn LanguageModel>,
        engine: &EngineConfig,
    ) -> Self {
        let synthesizer = RuleSynthesizer::new(
            model.clone(),
            engine.score.baseline,
            engine.synthesis_max_attempts,
        );
        Self {
            repository,
            model,
            synthesizer,
            seed_rules: engine.seed_rules,
            history: Vec::new(),
        }
    }

    /// Load the persisted rule collection. A corrupt snapshot degrades to
    /// an empty collection with a warning; an empty collection optionally
    /// gets a greeting seed rule so the symbolic path works out of the box.
    pub fn load_rules(&mut self) {
        if let Err(err) = self.repository.load() {
            warn!("starting with no rules: {}", err);
        }

        if self.seed_rules && self.repository.is_empty() {
            let seed = Rule::new(Pattern::new(SEED_PATTERN), SEED_RESPONSE, SEED_SCORE);
            match self.repository.add(seed) {
                Ok(()) => info!("added seed greeting rule to empty repository"),
                Err(err) => warn!("could not add seed rule: {}", err),
            }
        }
    }

    /// Run the matching half of a turn: answer from the best rule, or fall
    /// back to the language model. No repository mutation happens here.
    pub async fn answer(&mut self, query: &str) -> Result<Turn, AgentError> {
        let turn = match self.repository.select_best(query) {
            Some(rule) => {
                info!(rule_id = %rule.id, "query answered by rule");
                Turn {
                    id: Uuid::new_v4().to_string(),
                    query: query.to_string(),
                    response: rule.response.clone(),
                    rule_id: Some(rule.id.clone()),
                    status: TurnStatus::AnsweredByRule,
                }
            }
            None => {
                info!("no rule matched; falling back to the language model");
                let response = self.model.generate(query).await?;
                Turn {
                    id: Uuid::new_v4().to_string(),
                    query: query.to_string(),
                    response,
                    rule_id: None,
                    status: TurnStatus::AnsweredByFallback,
                }
            }
        };

        self.history.push(turn.clone());
        Ok(turn)
    }

    /// Resolve a turn's feedback.
    ///
    /// Positive on a rule reinforces it; negative without a correction
    /// penalizes it. A correction triggers synthesis of a new rule. On a
    /// fallback response with nothing to learn from, feedback is only
    /// recorded. Errors leave the repository unchanged.
    pub async fn feedback(
        &mut self,
        turn: &Turn,
        sentiment: Sentiment,
        correction: Option<&str>,
    ) -> Result<FeedbackOutcome, AgentError> {
        let correction = correction.map(str::trim).filter(|c| !c.is_empty());

        match (turn.rule_id.as_deref(), sentiment, correction) {
            (Some(rule_id), Sentiment::Positive, _) => {
                let score = self.repository.apply_feedback(rule_id, Sentiment::Positive)?;
                Ok(FeedbackOutcome::ScoreRaised(score))
            }
            (Some(rule_id), Sentiment::Negative, None) => {
                let score = self.repository.apply_feedback(rule_id, Sentiment::Negative)?;
                Ok(FeedbackOutcome::ScoreLowered(score))
            }
            (_, Sentiment::Negative, Some(correction)) => {
                let rule = self
                    .synthesizer
                    .synthesize(&turn.query, &turn.response, correction, self.repository.rules())
                    .await?;
                let rule_id = rule.id.clone();
                self.repository.add(rule)?;
                info!(rule_id = %rule_id, "learned new rule from correction");
                Ok(FeedbackOutcome::RuleSynthesized(rule_id))
            }
            (None, Sentiment::Positive, _) => {
                info!("positive feedback on fallback response; nothing to reinforce");
                Ok(FeedbackOutcome::Noted)
            }
            (None, Sentiment::Negative, None) => {
                info!("negative feedback on fallback response with no correction");
                Ok(FeedbackOutcome::Noted)
            }
        }
    }

    /// Human-readable account of how a turn's response was produced.
    pub fn explain(&self, turn: &Turn) -> String {
        match turn.rule_id.as_deref().and_then(|id| self.repository.get(id)) {
            Some(rule) => format!(
                "Source: rule {}\n\
                 Matched pattern: '{}'\n\
                 Score: {:.1}\n\
                 Historical success rate: {:.0}%",
                rule.id,
                rule.pattern,
                rule.score,
                rule.success_rate() * 100.0
            ),
            None => "Source: language model fallback\n\
                     No rule matched this query, so the answer came from the \
                     generative model rather than established logic."
                .to_string(),
        }
    }

    pub fn stats(&self) -> AgentStats {
        let rules = self.repository.rules();
        AgentStats {
            total_rules: rules.len(),
            proven_rules: rules
                .iter()
                .filter(|r| r.stats.times_positive > r.stats.times_negative)
                .count(),
            turns: self.history.len(),
            rule_hits: self
                .history
                .iter()
                .filter(|t| t.status == TurnStatus::AnsweredByRule)
                .count(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn repository(&self) -> &RuleRepository {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::score::ScorePolicy;
    use crate::error::{ModelError, StoreError};
    use crate::llm::MockLanguageModel;
    use crate::store::RuleStore;
    use std::sync::Mutex;

    struct InMemoryStore {
        snapshot: Mutex<Vec<Rule>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self {
                snapshot: Mutex::new(Vec::new()),
            }
        }
    }

    impl RuleStore for InMemoryStore {
        fn load(&self) -> Result<Vec<Rule>, StoreError> {
            Ok(self.snapshot.lock().unwrap().clone())
        }

        fn save(&self, rules: &[Rule]) -> Result<(), StoreError> {
            *self.snapshot.lock().unwrap() = rules.to_vec();
            Ok(())
        }
    }

    fn engine_config() -> EngineConfig {
        EngineConfig {
            score: ScorePolicy::default(),
            synthesis_max_attempts: 3,
            seed_rules: false,
        }
    }

    fn agent_with(model: MockLanguageModel, rules: Vec<Rule>) -> Agent {
        let mut repository =
            RuleRepository::new(Box::new(InMemoryStore::new()), ScorePolicy::default());
        for rule in rules {
            repository.add(rule).unwrap();
        }
        Agent::new(repository, Arc::new(model), &engine_config())
    }

    fn refund_rule() -> Rule {
        Rule::new(Pattern::new("refund + policy"), "5 business days.", 4.0)
    }

    #[tokio::test]
    async fn test_rule_hit_answers_without_model() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().times(0);
        let mut agent = agent_with(model, vec![refund_rule()]);

        let turn = agent.answer("what is the refund policy").await.unwrap();
        assert_eq!(turn.status, TurnStatus::AnsweredByRule);
        assert_eq!(turn.response, "5 business days.");
        assert!(turn.rule_id.is_some());
    }

    #[tokio::test]
    async fn test_miss_falls_back_to_model() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Ok("It depends on the store.".to_string()));
        let mut agent = agent_with(model, vec![]);

        let turn = agent.answer("what is the refund policy").await.unwrap();
        assert_eq!(turn.status, TurnStatus::AnsweredByFallback);
        assert_eq!(turn.response, "It depends on the store.");
        assert!(turn.rule_id.is_none());
    }

    #[tokio::test]
    async fn test_model_failure_degrades_turn_only() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Err(ModelError::Unavailable("down".into())));
        let mut agent = agent_with(model, vec![]);

        let err = agent.answer("anything").await.unwrap_err();
        assert_eq!(err.kind(), "model-unavailable");
        assert!(agent.repository().is_empty());
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_positive_feedback_on_rule_raises_score() {
        let mut agent = agent_with(MockLanguageModel::new(), vec![refund_rule()]);

        let turn = agent.answer("refund policy?").await.unwrap();
        let outcome = agent
            .feedback(&turn, Sentiment::Positive, None)
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::ScoreRaised(5.0));
    }

    #[tokio::test]
    async fn test_negative_feedback_without_correction_lowers_score() {
        let mut agent = agent_with(MockLanguageModel::new(), vec![refund_rule()]);

        let turn = agent.answer("refund policy?").await.unwrap();
        let outcome = agent
            .feedback(&turn, Sentiment::Negative, None)
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::ScoreLowered(3.0));
    }

    #[tokio::test]
    async fn test_fallback_positive_feedback_changes_nothing() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Ok("a guess".to_string()));
        let mut agent = agent_with(model, vec![]);

        let turn = agent.answer("unknown topic").await.unwrap();
        let outcome = agent
            .feedback(&turn, Sentiment::Positive, None)
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::Noted);
        assert!(agent.repository().is_empty());
    }

    #[tokio::test]
    async fn test_blank_correction_treated_as_absent() {
        let mut agent = agent_with(MockLanguageModel::new(), vec![refund_rule()]);

        let turn = agent.answer("refund policy?").await.unwrap();
        let outcome = agent
            .feedback(&turn, Sentiment::Negative, Some("   "))
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::ScoreLowered(3.0));
    }

    #[tokio::test]
    async fn test_correction_on_fallback_synthesizes_rule() {
        let mut model = MockLanguageModel::new();
        let mut calls = 0;
        model.expect_generate().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok("Refunds vary by retailer.".to_string())
            } else {
                Ok("Pattern: refund + policy\nResponse: Refunds are processed within 5 business days"
                    .to_string())
            }
        });
        let mut agent = agent_with(model, vec![]);

        let turn = agent.answer("what is the refund policy").await.unwrap();
        assert_eq!(turn.status, TurnStatus::AnsweredByFallback);

        let outcome = agent
            .feedback(
                &turn,
                Sentiment::Negative,
                Some("refunds are processed within 5 business days"),
            )
            .await
            .unwrap();

        let new_id = match outcome {
            FeedbackOutcome::RuleSynthesized(id) => id,
            other => panic!("expected synthesis, got {:?}", other),
        };

        assert_eq!(agent.repository().len(), 1);
        let rule = agent.repository().get(&new_id).unwrap();
        assert_eq!(rule.score, ScorePolicy::default().baseline);

        // The learned rule now answers the same question symbolically.
        let turn = agent.answer("what is the refund policy").await.unwrap();
        assert_eq!(turn.status, TurnStatus::AnsweredByRule);
        assert_eq!(
            turn.response,
            "Refunds are processed within 5 business days"
        );
    }

    #[tokio::test]
    async fn test_failed_synthesis_leaves_repository_unchanged() {
        let mut model = MockLanguageModel::new();
        let mut calls = 0;
        model.expect_generate().times(4).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok("a fallback answer".to_string())
            } else {
                Ok("nothing usable".to_string())
            }
        });
        let mut agent = agent_with(model, vec![]);

        let turn = agent.answer("some question").await.unwrap();
        let err = agent
            .feedback(&turn, Sentiment::Negative, Some("the right answer"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "synthesis-validation");
        assert!(agent.repository().is_empty());
    }

    #[tokio::test]
    async fn test_explain_rule_and_fallback_turns() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Ok("guessing".to_string()));
        let mut agent = agent_with(model, vec![refund_rule()]);

        let rule_turn = agent.answer("refund policy?").await.unwrap();
        let explanation = agent.explain(&rule_turn);
        assert!(explanation.contains("refund + policy"));

        let fallback_turn = agent.answer("weather tomorrow?").await.unwrap();
        let explanation = agent.explain(&fallback_turn);
        assert!(explanation.contains("fallback"));
    }

    #[tokio::test]
    async fn test_stats_track_rules_and_hits() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Ok("guess".to_string()));
        let mut agent = agent_with(model, vec![refund_rule()]);

        let turn = agent.answer("refund policy?").await.unwrap();
        agent
            .feedback(&turn, Sentiment::Positive, None)
            .await
            .unwrap();
        agent.answer("weather?").await.unwrap();

        let stats = agent.stats();
        assert_eq!(stats.total_rules, 1);
        assert_eq!(stats.proven_rules, 1);
        assert_eq!(stats.turns, 2);
        assert_eq!(stats.rule_hits, 1);
        assert_eq!(stats.rule_hit_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_seed_rule_added_to_empty_repository() {
        let repository =
            RuleRepository::new(Box::new(InMemoryStore::new()), ScorePolicy::default());
        let mut config = engine_config();
        config.seed_rules = true;
        let mut agent = Agent::new(repository, Arc::new(MockLanguageModel::new()), &config);

        agent.load_rules();
        assert_eq!(agent.repository().len(), 1);

        let turn = agent.answer("hello there").await.unwrap();
        assert_eq!(turn.status, TurnStatus::AnsweredByRule);
    }
}
