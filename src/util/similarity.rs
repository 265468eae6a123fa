//! Pairwise title similarity scorers.
//!
//! Every scorer takes two raw titles and returns a percentage in `[0, 100]`
//! rounded to two decimals. [`combined_similarity`] folds the four signals
//! into one score using a fixed priority order.

use std::collections::{HashMap, HashSet};

use super::title::{normalize_tokens, raw_words};

/// Shortest shared run of raw words that counts as a phrase match.
pub const MIN_CONSECUTIVE_RUN: usize = 3;
/// Keyword overlap below this percentage carries no signal.
pub const KEYWORD_OVERLAP_FLOOR: f64 = 70.0;
/// Consecutive-run score that takes priority over every other signal.
pub const CONSECUTIVE_PRIORITY: f64 = 30.0;
/// Weighted token overlap needed before it is preferred over edit distance.
pub const TOKEN_OVERLAP_PRIORITY: f64 = 60.0;

/// All four signals for one pair of titles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityBreakdown {
    pub token_overlap: f64,
    pub consecutive_run: f64,
    /// `None` when the overlap is under [`KEYWORD_OVERLAP_FLOOR`].
    pub keyword_overlap: Option<f64>,
    pub levenshtein: f64,
}

impl SimilarityBreakdown {
    pub fn compute(a: &str, b: &str) -> Self {
        Self {
            token_overlap: weighted_token_overlap(a, b),
            consecutive_run: consecutive_run_match(a, b),
            keyword_overlap: keyword_overlap(a, b),
            levenshtein: levenshtein_similarity(a, b),
        }
    }

    /// First applicable signal: phrase run, keyword dominance, token overlap,
    /// then character similarity as the fallback.
    pub fn combined(&self) -> f64 {
        if self.consecutive_run >= CONSECUTIVE_PRIORITY {
            return self.consecutive_run;
        }
        // a keyword score of zero means "no signal" and falls through
        if let Some(keyword) = self.keyword_overlap.filter(|score| *score > 0.0) {
            return keyword;
        }
        if self.token_overlap >= TOKEN_OVERLAP_PRIORITY {
            return self.token_overlap;
        }
        self.levenshtein
    }
}

/// Combined similarity for a pair of titles. Blank titles never match anything.
pub fn combined_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    SimilarityBreakdown::compute(a, b).combined()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Shared normalized tokens (counted with multiplicity) over the longer token list.
pub fn weighted_token_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = normalize_tokens(a);
    let tokens_b = normalize_tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let freq_a = frequencies(&tokens_a);
    let freq_b = frequencies(&tokens_b);

    let overlap: usize = freq_a
        .iter()
        .filter_map(|(token, count_a)| freq_b.get(token).map(|count_b| (*count_a).min(*count_b)))
        .sum();

    let longest = tokens_a.len().max(tokens_b.len());
    round2(overlap as f64 / longest as f64 * 100.0)
}

fn frequencies(tokens: &[String]) -> HashMap<&str, usize> {
    let mut freq = HashMap::new();
    for token in tokens {
        *freq.entry(token.as_str()).or_insert(0) += 1;
    }
    freq
}

/// Longest run of identical raw words shared by both titles, relative to the
/// longer title. Runs shorter than [`MIN_CONSECUTIVE_RUN`] score zero.
pub fn consecutive_run_match(a: &str, b: &str) -> f64 {
    let words_a = raw_words(a);
    let words_b = raw_words(b);

    let mut longest_run = 0;
    for i in 0..words_a.len() {
        for j in 0..words_b.len() {
            let run = words_a[i..]
                .iter()
                .zip(&words_b[j..])
                .take_while(|(left, right)| left == right)
                .count();
            longest_run = longest_run.max(run);
        }
    }

    if longest_run < MIN_CONSECUTIVE_RUN {
        return 0.0;
    }

    let longest_title = words_a.len().max(words_b.len());
    round2(longest_run as f64 / longest_title as f64 * 100.0)
}

/// Share of unique normalized keywords in common. Scores below
/// [`KEYWORD_OVERLAP_FLOOR`] are reported as `None`.
pub fn keyword_overlap(a: &str, b: &str) -> Option<f64> {
    let unique_a: HashSet<String> = normalize_tokens(a).into_iter().collect();
    let unique_b: HashSet<String> = normalize_tokens(b).into_iter().collect();

    let largest = unique_a.len().max(unique_b.len());
    if largest == 0 {
        return None;
    }

    let shared = unique_a.intersection(&unique_b).count();
    let score = shared as f64 / largest as f64 * 100.0;
    (score >= KEYWORD_OVERLAP_FLOOR).then(|| round2(score))
}

/// Character-level similarity of the lowercased titles. Two empty titles are identical.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }

    let distance = strsim::levenshtein(&a, &b);
    round2((1.0 - distance as f64 / max_len as f64) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SMALL_RETAILERS: &str = "An Inventory Management System for Small Retailers";
    const LOCAL_RETAILERS: &str = "An Inventory Management System for Local Retailers";

    #[test]
    fn token_overlap_counts_shared_multiset() {
        // tokens: [smart, farm, monitor] vs [smart, farm, irrigation, control]
        let score = weighted_token_overlap(
            "Smart Farm Monitoring",
            "Smart Farm Irrigation Control",
        );
        assert_eq!(score, 50.0);
    }

    #[test]
    fn token_overlap_is_zero_without_tokens() {
        assert_eq!(weighted_token_overlap("", "Library System"), 0.0);
        assert_eq!(weighted_token_overlap("of the", "a an"), 0.0);
    }

    #[test]
    fn consecutive_run_requires_three_words() {
        assert_eq!(
            consecutive_run_match("Online Voting Platform", "Online Voting Kiosk"),
            0.0
        );
        assert_eq!(
            consecutive_run_match("Online Voting Platform", "Secure Online Voting Platform"),
            75.0
        );
    }

    #[test]
    fn keyword_overlap_below_floor_is_no_signal() {
        assert_eq!(
            keyword_overlap("Clinic Appointment Scheduler", "Clinic Billing Portal"),
            None
        );
        assert_eq!(keyword_overlap("", ""), None);
        assert_eq!(
            keyword_overlap("Library Book Tracker", "Book Tracker for Library"),
            Some(100.0)
        );
    }

    #[test]
    fn levenshtein_matches_known_distances() {
        // kitten -> sitting is three edits over seven characters
        assert_eq!(levenshtein_similarity("kitten", "sitting"), 57.14);
        assert_eq!(levenshtein_similarity("", "abc"), 0.0);
        assert_eq!(levenshtein_similarity("", ""), 100.0);
        assert_eq!(levenshtein_similarity("ABC", "abc"), 100.0);
        assert_eq!(levenshtein_similarity("abcd", "abcf"), 75.0);
    }

    #[test]
    fn one_word_difference_uses_run_score() {
        let breakdown = SimilarityBreakdown::compute(SMALL_RETAILERS, LOCAL_RETAILERS);
        // five shared words "an inventory management system for" out of seven
        assert_eq!(breakdown.consecutive_run, 71.43);
        assert_eq!(breakdown.combined(), 71.43);
        assert_eq!(combined_similarity(SMALL_RETAILERS, LOCAL_RETAILERS), 71.43);
    }

    #[test]
    fn unrelated_titles_fall_back_to_levenshtein() {
        let a = "Mobile App for Food Ordering";
        let b = "Web Platform for Hotel Booking";
        let breakdown = SimilarityBreakdown::compute(a, b);
        assert_eq!(breakdown.consecutive_run, 0.0);
        assert_eq!(breakdown.keyword_overlap, None);
        assert_eq!(breakdown.token_overlap, 0.0);
        assert_eq!(breakdown.combined(), breakdown.levenshtein);
        assert!(breakdown.combined() < 60.0);
    }

    #[test]
    fn keyword_signal_outranks_token_overlap() {
        let breakdown = SimilarityBreakdown {
            token_overlap: 90.0,
            consecutive_run: 0.0,
            keyword_overlap: Some(75.0),
            levenshtein: 10.0,
        };
        assert_eq!(breakdown.combined(), 75.0);
    }

    #[test]
    fn short_run_falls_through_to_next_signal() {
        let breakdown = SimilarityBreakdown {
            token_overlap: 65.0,
            consecutive_run: 25.0,
            keyword_overlap: None,
            levenshtein: 10.0,
        };
        assert_eq!(breakdown.combined(), 65.0);

        let weak = SimilarityBreakdown {
            token_overlap: 40.0,
            ..breakdown
        };
        assert_eq!(weak.combined(), 10.0);
    }

    #[test]
    fn blank_titles_never_match() {
        assert_eq!(combined_similarity("", ""), 0.0);
        assert_eq!(combined_similarity("   ", "Library System"), 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn combined_similarity_is_symmetric(a in "[a-z ]{0,40}", b in "[a-z ]{0,40}") {
            prop_assert_eq!(combined_similarity(&a, &b), combined_similarity(&b, &a));
        }

        #[test]
        fn levenshtein_identity(s in "\\PC{0,30}") {
            prop_assert_eq!(levenshtein_similarity(&s, &s), 100.0);
        }

        #[test]
        fn scores_stay_in_range(a in "[a-zA-Z ,.]{0,40}", b in "[a-zA-Z ,.]{0,40}") {
            let breakdown = SimilarityBreakdown::compute(&a, &b);
            for score in [
                breakdown.token_overlap,
                breakdown.consecutive_run,
                breakdown.keyword_overlap.unwrap_or(0.0),
                breakdown.levenshtein,
            ] {
                prop_assert!((0.0..=100.0).contains(&score));
            }
        }
    }
}
