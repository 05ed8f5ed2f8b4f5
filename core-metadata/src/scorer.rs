//! Candidate ranking against the query title.
//!
//! A score is the summed length of query tokens found in the candidate plus
//! bonuses for exact equality, containment and a shared leading run of
//! tokens, minus a penalty when the two titles differ a lot in length.

use crate::normalizer::search_form;
use crate::query::{Candidate, ScoredCandidate};
use std::collections::HashSet;

/// Tunable weights for [`MatchScorer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWeights {
    pub exact_bonus: f64,
    pub containment_bonus: f64,
    /// Added once per leading token the two titles share
    pub leading_token_bonus: f64,
    pub length_penalty: f64,
    /// Fraction of the query length the candidate may differ by unpenalized
    pub length_tolerance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            exact_bonus: 100.0,
            containment_bonus: 25.0,
            leading_token_bonus: 5.0,
            length_penalty: 20.0,
            length_tolerance: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    weights: ScoreWeights,
}

impl MatchScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Similarity of `candidate` to `query`; higher is better.
    pub fn score(&self, query: &str, candidate: &str) -> f64 {
        let query = search_form(query);
        let candidate = search_form(candidate);
        if query.is_empty() || candidate.is_empty() {
            return 0.0;
        }

        let query_tokens: Vec<&str> = query.split(' ').collect();
        let candidate_tokens: Vec<&str> = candidate.split(' ').collect();
        let candidate_set: HashSet<&str> = candidate_tokens.iter().copied().collect();

        let mut seen = HashSet::new();
        let mut score: f64 = query_tokens
            .iter()
            .filter(|t| candidate_set.contains(*t) && seen.insert(**t))
            .map(|t| t.chars().count() as f64)
            .sum();

        if query == candidate {
            score += self.weights.exact_bonus;
        } else if candidate.contains(&query) || query.contains(&candidate) {
            score += self.weights.containment_bonus;
        }

        let shared_leading = query_tokens
            .iter()
            .zip(&candidate_tokens)
            .take_while(|(a, b)| a == b)
            .count();
        score += shared_leading as f64 * self.weights.leading_token_bonus;

        let query_len = query.chars().count() as f64;
        let length_diff = (query_len - candidate.chars().count() as f64).abs();
        if length_diff > query_len * self.weights.length_tolerance {
            score -= self.weights.length_penalty;
        }

        score
    }

    /// Score every candidate, keeping source order.
    pub fn rank(&self, query: &str, candidates: Vec<Candidate>) -> Vec<ScoredCandidate> {
        candidates
            .into_iter()
            .map(|candidate| ScoredCandidate {
                score: self.score(query, &candidate.display_title),
                candidate,
            })
            .collect()
    }

    /// Highest-scoring candidate at or above `threshold`.
    ///
    /// On equal scores the earlier candidate wins.
    pub fn select_best(
        &self,
        scored: Vec<ScoredCandidate>,
        threshold: f64,
    ) -> Option<ScoredCandidate> {
        let mut best: Option<ScoredCandidate> = None;
        for item in scored {
            if item.score < threshold {
                continue;
            }
            match &best {
                Some(current) if item.score <= current.score => {}
                _ => best = Some(item),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str) -> Candidate {
        Candidate::new("test", title, title)
    }

    #[test]
    fn test_exact_match_scores_highest() {
        let scorer = MatchScorer::new();
        let query = "Metroid Prime 2: Echoes";
        let exact = scorer.score(query, query);
        for other in [
            "Metroid Prime 2",
            "Metroid Prime 2: Echoes Bonus Disc",
            "Metroid Prime",
            "Echoes",
            "Prime Echoes Metroid",
        ] {
            assert!(exact >= scorer.score(query, other), "{}", other);
        }
    }

    #[test]
    fn test_exact_match_ignores_case_and_punctuation() {
        let scorer = MatchScorer::new();
        assert_eq!(
            scorer.score("Halo 2", "HALO 2"),
            scorer.score("Halo 2", "Halo 2")
        );
    }

    #[test]
    fn test_score_components() {
        let scorer = MatchScorer::new();
        // halo(4) + 2(1) + exact 100 + two leading tokens 10
        assert_eq!(scorer.score("Halo 2", "Halo 2"), 115.0);
        // halo(4) + 2(1) + containment 25 + leading 10 - length penalty 20
        assert_eq!(scorer.score("Halo 2", "Halo 2 Multiplayer Map Pack"), 20.0);
        // nothing shared, very different length
        assert_eq!(scorer.score("Ico", "Shadow of the Colossus"), -20.0);
    }

    #[test]
    fn test_repeated_tokens_count_once() {
        let scorer = MatchScorer::new();
        let once = scorer.score("Mega Man Mega", "Mega Man");
        // mega(4) + man(3) + containment + leading two tokens
        assert_eq!(once, 4.0 + 3.0 + 25.0 + 10.0);
    }

    #[test]
    fn test_select_best_threshold_and_ties() {
        let scorer = MatchScorer::new();
        let scored = vec![
            ScoredCandidate { candidate: candidate("a"), score: 8.0 },
            ScoredCandidate { candidate: candidate("b"), score: 30.0 },
            ScoredCandidate { candidate: candidate("c"), score: 30.0 },
        ];

        let best = scorer.select_best(scored.clone(), 10.0).unwrap();
        assert_eq!(best.candidate.display_title, "b");

        assert!(scorer.select_best(scored, 31.0).is_none());
        assert!(scorer.select_best(Vec::new(), 0.0).is_none());
    }

    #[test]
    fn test_rank_keeps_order() {
        let scorer = MatchScorer::new();
        let ranked = scorer.rank(
            "Ico",
            vec![candidate("Ico"), candidate("Ico HD"), candidate("Other")],
        );
        let titles: Vec<&str> = ranked
            .iter()
            .map(|s| s.candidate.display_title.as_str())
            .collect();
        assert_eq!(titles, vec!["Ico", "Ico HD", "Other"]);
        assert!(ranked[0].score > ranked[1].score);
    }
}
