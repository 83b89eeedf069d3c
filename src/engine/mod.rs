//! Rule engine core: representation, matching, scoring, synthesis, and the
//! turn controller that ties them together.

pub mod controller;
pub mod matcher;
pub mod repository;
pub mod rule;
pub mod score;
pub mod synthesis;

pub use controller::{Agent, AgentStats, FeedbackOutcome, Turn, TurnStatus};
pub use repository::RuleRepository;
pub use rule::{Pattern, Rule, RuleStats};
pub use score::{ScorePolicy, ScoreUpdater, Sentiment};
pub use synthesis::RuleSynthesizer;
