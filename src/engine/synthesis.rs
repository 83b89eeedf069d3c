//! Rule synthesis from user corrections.
//!
//! Turns a (query, wrong answer, correction) triple into a candidate rule
//! by asking the language model for a structured pattern + response, then
//! validating the candidate before it can reach the repository.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::llm::LanguageModel;

use super::rule::{Pattern, Rule};

static PATTERN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[^\w]*pattern\s*:\s*(.+)$").expect("valid regex literal"));
static RESPONSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[^\w]*response\s*:\s*(.+)$").expect("valid regex literal"));

pub struct RuleSynthesizer {
    model: Arc<dyn LanguageModel>,
    /// Starting score for accepted candidates.
    baseline_score: f64,
    /// Model calls allowed per synthesis before giving up on malformed output.
    max_attempts: u32,
}

impl RuleSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, baseline_score: f64, max_attempts: u32) -> Self {
        Self {
            model,
            baseline_score,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Produce a validated new rule from a correction.
    ///
    /// The request is deterministic in its inputs; the model's reply is not,
    /// so malformed replies are retried up to `max_attempts`. A candidate
    /// whose pattern duplicates an existing rule fails immediately: the
    /// repository contents would make any retry a duplicate too.
    pub async fn synthesize(
        &self,
        query: &str,
        wrong_response: &str,
        correction: &str,
        existing: &[Rule],
    ) -> Result<Rule, AgentError> {
        let prompt = build_prompt(query, wrong_response, correction);
        let mut last_failure = String::from("no attempts made");

        for attempt in 1..=self.max_attempts {
            let reply = self.model.generate(&prompt).await?;
            debug!(attempt, "synthesis reply: {}", reply);

            let (pattern_text, response) = match parse_candidate(&reply) {
                Some(candidate) => candidate,
                None => {
                    last_failure =
                        format!("attempt {}: reply had no pattern/response lines", attempt);
                    warn!("{}", last_failure);
                    continue;
                }
            };

            let pattern = Pattern::new(&pattern_text);
            if pattern.is_empty() || response.trim().is_empty() {
                last_failure = format!("attempt {}: empty pattern or response", attempt);
                warn!("{}", last_failure);
                continue;
            }

            let key = pattern.normalized();
            if existing.iter().any(|r| r.pattern.normalized() == key) {
                return Err(AgentError::SynthesisValidation(format!(
                    "pattern '{}' duplicates an existing rule",
                    pattern
                )));
            }

            let rule = Rule::new(pattern, response.trim(), self.baseline_score);
            info!(rule_id = %rule.id, pattern = %rule.pattern, "synthesized rule candidate");
            return Ok(rule);
        }

        Err(AgentError::SynthesisValidation(format!(
            "no valid candidate after {} attempts ({})",
            self.max_attempts, last_failure
        )))
    }
}

/// Deterministic synthesis request: same inputs, same prompt.
fn build_prompt(query: &str, wrong_response: &str, correction: &str) -> String {
    format!(
        "A user asked: \"{query}\"\n\
         The answer given was unsatisfactory: \"{wrong_response}\"\n\
         The user says the correct answer is: \"{correction}\"\n\
         \n\
         Create one precise rule so this kind of question is answered correctly \
         next time. The pattern is a few keywords from the user's question that \
         capture its intent; join keywords that must ALL be present with '+'.\n\
         \n\
         Reply with exactly two lines and nothing else:\n\
         Pattern: <keywords>\n\
         Response: <the correct answer>"
    )
}

/// Extract the `Pattern:` and `Response:` lines from a model reply.
fn parse_candidate(reply: &str) -> Option<(String, String)> {
    let pattern = PATTERN_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())?;
    let response = RESPONSE_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())?;
    Some((pattern, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::MockLanguageModel;

    #[test]
    fn test_parse_candidate_clean_reply() {
        let reply = "Pattern: refund + policy\nResponse: Refunds take 5 business days.";
        let (pattern, response) = parse_candidate(reply).unwrap();
        assert_eq!(pattern, "refund + policy");
        assert_eq!(response, "Refunds take 5 business days.");
    }

    #[test]
    fn test_parse_candidate_tolerates_prose_and_case() {
        let reply = "Sure! Here is the rule you asked for:\n\n\
                     - PATTERN: shipping + cost\n\
                     - response:  Shipping is free over $50.\n\n\
                     Let me know if you need anything else.";
        let (pattern, response) = parse_candidate(reply).unwrap();
        assert_eq!(pattern, "shipping + cost");
        assert_eq!(response, "Shipping is free over $50.");
    }

    #[test]
    fn test_parse_candidate_missing_lines() {
        assert!(parse_candidate("I cannot determine a rule here.").is_none());
        assert!(parse_candidate("Pattern: refund").is_none());
    }

    #[test]
    fn test_build_prompt_is_deterministic() {
        let a = build_prompt("q", "wrong", "right");
        let b = build_prompt("q", "wrong", "right");
        assert_eq!(a, b);
        assert!(a.contains("\"q\""));
        assert!(a.contains("\"right\""));
    }

    #[tokio::test]
    async fn test_synthesize_accepts_well_formed_candidate() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().times(1).returning(|_| {
            Ok("Pattern: refund + policy\nResponse: 5 business days.".to_string())
        });

        let synthesizer = RuleSynthesizer::new(Arc::new(model), 2.0, 3);
        let rule = synthesizer
            .synthesize("what is the refund policy", "not sure", "5 business days.", &[])
            .await
            .unwrap();

        assert_eq!(rule.pattern.as_str(), "refund + policy");
        assert_eq!(rule.response, "5 business days.");
        assert_eq!(rule.score, 2.0);
        assert!(!rule.id.is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_retries_malformed_then_succeeds() {
        let mut model = MockLanguageModel::new();
        let mut calls = 0;
        model.expect_generate().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok("I'm not sure how to phrase that as a rule.".to_string())
            } else {
                Ok("Pattern: hours\nResponse: Open 9-5.".to_string())
            }
        });

        let synthesizer = RuleSynthesizer::new(Arc::new(model), 2.0, 3);
        let rule = synthesizer
            .synthesize("when are you open", "dunno", "Open 9-5.", &[])
            .await
            .unwrap();
        assert_eq!(rule.response, "Open 9-5.");
    }

    #[tokio::test]
    async fn test_synthesize_gives_up_after_max_attempts() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(3)
            .returning(|_| Ok("no structure here".to_string()));

        let synthesizer = RuleSynthesizer::new(Arc::new(model), 2.0, 3);
        let err = synthesizer
            .synthesize("q", "wrong", "right", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SynthesisValidation(_)));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_duplicate_pattern_without_retry() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().times(1).returning(|_| {
            Ok("Pattern: refund + policy\nResponse: different text".to_string())
        });

        let existing = vec![Rule::new(Pattern::new("Refund + Policy"), "old", 5.0)];
        let synthesizer = RuleSynthesizer::new(Arc::new(model), 2.0, 3);
        let err = synthesizer
            .synthesize("q", "wrong", "right", &existing)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SynthesisValidation(_)));
    }

    #[tokio::test]
    async fn test_synthesize_propagates_model_errors() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Err(ModelError::Unavailable("connection refused".into())));

        let synthesizer = RuleSynthesizer::new(Arc::new(model), 2.0, 3);
        let err = synthesizer
            .synthesize("q", "wrong", "right", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_candidate_fields() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(2)
            .returning(|_| Ok("Pattern: +\nResponse: something".to_string()));

        let synthesizer = RuleSynthesizer::new(Arc::new(model), 2.0, 2);
        let err = synthesizer
            .synthesize("q", "wrong", "right", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SynthesisValidation(_)));
    }
}
