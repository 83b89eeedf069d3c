//! Query-to-rule matching and ranking.
//!
//! Pure functions over a repository snapshot: same snapshot and query
//! always produce the same result.

use std::cmp::Ordering;

use super::rule::{normalize, Rule};

/// All rules whose pattern predicate is satisfied by the query, in
/// repository order.
pub fn find_matching<'a>(query: &str, rules: &'a [Rule]) -> Vec<&'a Rule> {
    let normalized = normalize(query);
    rules
        .iter()
        .filter(|rule| rule.pattern.matches(&normalized))
        .collect()
}

/// The single best rule for a query, or None when nothing matches.
///
/// Ranking: score descending, then most recently used, then id ascending
/// so ties resolve the same way on every call.
pub fn select_best<'a>(query: &str, rules: &'a [Rule]) -> Option<&'a Rule> {
    let mut matched = find_matching(query, rules);
    matched.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.stats.last_used.cmp(&a.stats.last_used))
            .then_with(|| a.id.cmp(&b.id))
    });
    matched.first().copied()
}
