//! Ingredient classification against the reference index.
//!
//! # Algorithm
//!
//! 1. Empty token → SAFE, no match.
//! 2. Token in the [`SafeOverrideSet`](crate::index::SafeOverrideSet) → SAFE.
//!    Overrides win over every match, exact ones included.
//! 3. Exact key hit → PROHIBITED, score 100, CMR annotation copied.
//! 4. Otherwise score the token against every fuzzy candidate and keep the
//!    best. Ties go to the CMR entry, then the shorter key, then the
//!    lexicographically smaller key.
//! 5. Best score ≥ `prohibited` → PROHIBITED; ≥ `warning` → WARNING;
//!    below → SAFE with no match, the best score kept for diagnostics.
//!
//! Classification is a pure function of the token and the pinned
//! [`DatasetSnapshot`]; it never fails.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::index::{Candidate, DatasetSnapshot};
use crate::models::{DatasetVersion, MatchStatus, MatchType, MatchVerdict};
use crate::normalize::NormalizedToken;
use crate::similarity::{LevenshteinRatio, Similarity};

/// Score cut-offs for fuzzy verdicts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Scores at or above this are PROHIBITED.
    pub prohibited: f64,
    /// Scores at or above this (and below `prohibited`) are WARNING.
    pub warning: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            prohibited: 98.0,
            warning: 90.0,
        }
    }
}

impl Thresholds {
    /// Status for a fuzzy score, or `None` when it falls below `warning`.
    pub fn status_for(&self, score: f64) -> Option<MatchStatus> {
        if score >= self.prohibited {
            Some(MatchStatus::Prohibited)
        } else if score >= self.warning {
            Some(MatchStatus::Warning)
        } else {
            None
        }
    }
}

/// Anything that turns a normalized token into a verdict for one dataset version.
///
/// [`ResultCache`](crate::cache::ResultCache) memoizes through this trait,
/// keyed by [`dataset_version`](Classify::dataset_version).
pub trait Classify: Send + Sync {
    fn dataset_version(&self) -> &DatasetVersion;
    fn classify(&self, token: &NormalizedToken) -> MatchVerdict;
}

/// Exact, fuzzy, and override matching against one dataset snapshot.
#[derive(Clone)]
pub struct Matcher {
    snapshot: DatasetSnapshot,
    similarity: Arc<dyn Similarity>,
    thresholds: Thresholds,
    prefilter: bool,
}

impl Matcher {
    /// Matcher with the Levenshtein ratio, default thresholds, and length pre-filtering.
    pub fn new(snapshot: DatasetSnapshot) -> Self {
        Self {
            snapshot,
            similarity: Arc::new(LevenshteinRatio),
            thresholds: Thresholds::default(),
            prefilter: true,
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// When enabled, skips candidates whose length alone rules out a WARNING.
    pub fn with_prefilter(mut self, prefilter: bool) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// Same metric, thresholds, and pre-filtering against another dataset.
    pub fn with_snapshot(&self, snapshot: DatasetSnapshot) -> Self {
        Self {
            snapshot,
            similarity: Arc::clone(&self.similarity),
            thresholds: self.thresholds,
            prefilter: self.prefilter,
        }
    }

    pub fn snapshot(&self) -> &DatasetSnapshot {
        &self.snapshot
    }

    pub fn similarity_name(&self) -> &str {
        self.similarity.name()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Candidates worth scoring for a token of `chars` characters.
    ///
    /// Candidates are sorted by length and the metric's upper bound peaks
    /// where lengths are equal, so the viable ones form one contiguous run.
    fn candidate_window(&self, chars: usize) -> &[Candidate] {
        let all = self.snapshot.index.candidates();
        if !self.prefilter {
            return all;
        }
        let floor = self.thresholds.warning;
        let lo = all.partition_point(|c| {
            c.chars < chars && self.similarity.upper_bound(chars, c.chars) < floor
        });
        let hi = all.partition_point(|c| {
            c.chars <= chars || self.similarity.upper_bound(chars, c.chars) >= floor
        });
        if lo >= hi {
            return &[];
        }
        &all[lo..hi]
    }

    fn best_fuzzy(&self, token: &str) -> Option<(&Candidate, f64)> {
        let chars = token.chars().count();
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in self.candidate_window(chars) {
            let score = self.similarity.score(token, &candidate.key);
            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    rank(candidate, score, current, current_score) == Ordering::Less
                }
            };
            if better {
                best = Some((candidate, score));
            }
        }
        best
    }
}

/// Orders `(a, a_score)` before `(b, b_score)` when `a` is the better match.
fn rank(a: &Candidate, a_score: f64, b: &Candidate, b_score: f64) -> Ordering {
    b_score
        .total_cmp(&a_score)
        .then_with(|| b.entry.is_cmr.cmp(&a.entry.is_cmr))
        .then_with(|| a.chars.cmp(&b.chars))
        .then_with(|| a.key.cmp(&b.key))
}

impl Classify for Matcher {
    fn dataset_version(&self) -> &DatasetVersion {
        self.snapshot.version()
    }

    fn classify(&self, token: &NormalizedToken) -> MatchVerdict {
        if token.is_empty() {
            return MatchVerdict::safe(MatchType::None, 0.0);
        }

        if self.snapshot.overrides.contains(token) {
            return MatchVerdict::safe(MatchType::SafeList, 0.0);
        }

        if let Some(entry) = self.snapshot.index.lookup_exact(token) {
            return MatchVerdict::matched(
                MatchStatus::Prohibited,
                MatchType::Exact,
                Arc::clone(entry),
                100.0,
            );
        }

        match self.best_fuzzy(token.as_str()) {
            Some((candidate, score)) => match self.thresholds.status_for(score) {
                Some(status) => MatchVerdict::matched(
                    status,
                    MatchType::Fuzzy,
                    Arc::clone(&candidate.entry),
                    score,
                ),
                None => MatchVerdict::safe(MatchType::None, score),
            },
            None => MatchVerdict::safe(MatchType::None, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ReferenceIndex, SafeOverrideSet};
    use crate::models::ReferenceEntry;
    use crate::normalize::normalize;
    use std::collections::HashMap;

    /// Returns a fixed score for each candidate key, 0 otherwise.
    struct FixedScores(HashMap<&'static str, f64>);

    impl Similarity for FixedScores {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, a: &str, b: &str) -> f64 {
            self.0
                .get(a)
                .or_else(|| self.0.get(b))
                .copied()
                .unwrap_or(0.0)
        }
    }

    fn annex() -> Vec<ReferenceEntry> {
        vec![
            ReferenceEntry::new("Hydroquinone", "II/1339")
                .with_synonyms(["Quinol", "1,4-Benzenediol"])
                .with_cmr(Some("Reprotoxic Cat. 1B")),
            ReferenceEntry::new("Trichloroacetic acid", "II/1180").with_cmr(None),
            ReferenceEntry::new("Formaldehyde", "II/1577").with_cas("50-00-0"),
            ReferenceEntry::new("Glycerin", "II/TEST"),
        ]
    }

    fn matcher_for(rows: Vec<ReferenceEntry>, overrides: SafeOverrideSet) -> Matcher {
        let index = ReferenceIndex::build(DatasetVersion::new("test"), rows);
        Matcher::new(DatasetSnapshot::new(index, overrides))
    }

    fn default_matcher() -> Matcher {
        matcher_for(annex(), SafeOverrideSet::with_defaults())
    }

    #[test]
    fn test_empty_token_is_safe() {
        let verdict = default_matcher().classify(&normalize("  ... "));
        assert_eq!(verdict.status, MatchStatus::Safe);
        assert!(verdict.matched_entry.is_none());
    }

    #[test]
    fn test_exact_match_is_prohibited_with_cmr() {
        let verdict = default_matcher().classify(&normalize("Hydroquinone"));
        assert_eq!(verdict.status, MatchStatus::Prohibited);
        assert_eq!(verdict.match_type, MatchType::Exact);
        assert_eq!(verdict.score, 100.0);
        assert!(verdict.is_cmr);
        assert_eq!(verdict.cmr_note.as_deref(), Some("Reprotoxic Cat. 1B"));
        assert_eq!(verdict.matched_entry.unwrap().regulation_id, "II/1339");
    }

    #[test]
    fn test_every_synonym_matches_exactly() {
        let matcher = default_matcher();
        for entry in annex() {
            if entry.canonical_name == "Glycerin" {
                continue;
            }
            for name in std::iter::once(&entry.canonical_name).chain(entry.synonyms.iter()) {
                let verdict = matcher.classify(&normalize(name));
                assert_eq!(verdict.status, MatchStatus::Prohibited, "{}", name);
                assert_eq!(verdict.score, 100.0);
            }
        }
    }

    #[test]
    fn test_cas_number_matches_exactly() {
        let verdict = default_matcher().classify(&normalize("50-00-0"));
        assert_eq!(verdict.status, MatchStatus::Prohibited);
        assert_eq!(verdict.matched_entry.unwrap().canonical_name, "Formaldehyde");
    }

    #[test]
    fn test_safe_override_beats_exact_match() {
        let verdict = default_matcher().classify(&normalize("Glycerin"));
        assert_eq!(verdict.status, MatchStatus::Safe);
        assert_eq!(verdict.match_type, MatchType::SafeList);
        assert!(verdict.matched_entry.is_none());

        let without_overrides = matcher_for(annex(), SafeOverrideSet::new());
        let verdict = without_overrides.classify(&normalize("Glycerin"));
        assert_eq!(verdict.status, MatchStatus::Prohibited);
    }

    #[test]
    fn test_misspelling_is_warning_with_score() {
        // one deletion in twenty characters
        let verdict = default_matcher().classify(&normalize("Trichloroacetic acd"));
        assert_eq!(verdict.status, MatchStatus::Warning);
        assert_eq!(verdict.match_type, MatchType::Fuzzy);
        assert_eq!(verdict.score, 95.0);
        assert!(verdict.is_cmr);
    }

    #[test]
    fn test_unrelated_token_is_safe_with_best_score_kept() {
        let verdict = default_matcher()
            .with_prefilter(false)
            .classify(&normalize("Phenoxyethanol"));
        assert_eq!(verdict.status, MatchStatus::Safe);
        assert!(verdict.matched_entry.is_none());
        assert!(verdict.score > 0.0 && verdict.score < 90.0);
    }

    #[test]
    fn test_threshold_boundaries() {
        let rows = vec![
            ReferenceEntry::new("alpha", "II/A"),
            ReferenceEntry::new("bravo", "II/B"),
            ReferenceEntry::new("charlie", "II/C"),
        ];
        let cases = [
            ("alpha", 98.0, MatchStatus::Prohibited),
            ("bravo", 90.0, MatchStatus::Warning),
            ("charlie", 89.999, MatchStatus::Safe),
        ];
        for (key, score, expected) in cases {
            let metric = FixedScores(HashMap::from([(key, score)]));
            let matcher = matcher_for(rows.clone(), SafeOverrideSet::new())
                .with_similarity(Arc::new(metric));
            let verdict = matcher.classify(&normalize("zzz"));
            assert_eq!(verdict.status, expected, "score {}", score);
            assert_eq!(verdict.score, score);
            assert_eq!(verdict.matched_entry.is_some(), expected != MatchStatus::Safe);
        }
    }

    #[test]
    fn test_ties_prefer_cmr_then_shorter_then_lexicographic() {
        let rows = vec![
            ReferenceEntry::new("bbbb", "II/1"),
            ReferenceEntry::new("cccccc", "II/2").with_cmr(None),
            ReferenceEntry::new("abd", "II/3"),
            ReferenceEntry::new("abc", "II/4"),
        ];
        let all_95 = FixedScores(HashMap::from([
            ("bbbb", 95.0),
            ("cccccc", 95.0),
            ("abd", 95.0),
            ("abc", 95.0),
        ]));
        let matcher = matcher_for(rows.clone(), SafeOverrideSet::new())
            .with_similarity(Arc::new(all_95));
        let verdict = matcher.classify(&normalize("zzz"));
        assert_eq!(verdict.matched_entry.unwrap().canonical_name, "cccccc");

        let no_cmr: Vec<ReferenceEntry> = rows
            .into_iter()
            .filter(|r| !r.is_cmr)
            .collect();
        let all_95 = FixedScores(HashMap::from([("bbbb", 95.0), ("abd", 95.0), ("abc", 95.0)]));
        let matcher = matcher_for(no_cmr, SafeOverrideSet::new()).with_similarity(Arc::new(all_95));
        let verdict = matcher.classify(&normalize("zzz"));
        assert_eq!(verdict.matched_entry.unwrap().canonical_name, "abc");
    }

    #[test]
    fn test_empty_index_is_always_safe() {
        let matcher = matcher_for(Vec::new(), SafeOverrideSet::new());
        for raw in ["Hydroquinone", "Water", "x"] {
            let verdict = matcher.classify(&normalize(raw));
            assert_eq!(verdict.status, MatchStatus::Safe);
            assert_eq!(verdict.score, 0.0);
        }
    }

    #[test]
    fn test_prefilter_does_not_change_verdicts() {
        let filtered = default_matcher();
        let unfiltered = default_matcher().with_prefilter(false);
        for raw in [
            "Hydroquinon",
            "Trichloroacetic acd",
            "Formaldehide",
            "Quinoll",
            "Water",
            "Sodium Laureth Sulfate",
        ] {
            let token = normalize(raw);
            let a = filtered.classify(&token);
            let b = unfiltered.classify(&token);
            assert_eq!(a.status, b.status, "{}", raw);
            assert_eq!(a.matched_entry, b.matched_entry, "{}", raw);
            if a.status != MatchStatus::Safe {
                assert_eq!(a.score, b.score);
            }
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = default_matcher()
            .with_prefilter(false)
            .with_thresholds(Thresholds {
                prohibited: 99.0,
                warning: 96.0,
            });
        let verdict = strict.classify(&normalize("Trichloroacetic acd"));
        assert_eq!(verdict.status, MatchStatus::Safe);
        assert_eq!(verdict.score, 95.0);
    }
}
