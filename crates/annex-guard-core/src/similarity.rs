//! String similarity metrics for fuzzy matching.
//!
//! Every metric returns a symmetric score in `[0, 100]`. Metrics may also
//! report an upper bound from string lengths alone, which the matcher uses
//! to skip candidates that cannot reach the warning threshold.

/// A symmetric string similarity metric scored in `[0, 100]`.
pub trait Similarity: Send + Sync {
    /// Short identifier used in configuration (e.g. `"levenshtein"`).
    fn name(&self) -> &str;

    /// Similarity of `a` and `b`. Must satisfy `score(a, b) == score(b, a)`.
    fn score(&self, a: &str, b: &str) -> f64;

    /// Highest score any pair of strings with these character counts can reach.
    fn upper_bound(&self, _a_chars: usize, _b_chars: usize) -> f64 {
        100.0
    }
}

/// Edit-distance ratio: `100 × (max_len − distance) / max_len`.
///
/// Integer arithmetic is kept until the final division so that ratios
/// such as 49/50 land exactly on 98.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinRatio;

impl Similarity for LevenshteinRatio {
    fn name(&self) -> &str {
        "levenshtein"
    }

    fn score(&self, a: &str, b: &str) -> f64 {
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 100.0;
        }
        let distance = strsim::levenshtein(a, b);
        ((max_len - distance) as f64 * 100.0) / max_len as f64
    }

    fn upper_bound(&self, a_chars: usize, b_chars: usize) -> f64 {
        let max_len = a_chars.max(b_chars);
        if max_len == 0 {
            return 100.0;
        }
        let min_distance = a_chars.abs_diff(b_chars);
        ((max_len - min_distance) as f64 * 100.0) / max_len as f64
    }
}

/// Jaro-Winkler similarity scaled to `[0, 100]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Similarity for JaroWinkler {
    fn name(&self) -> &str {
        "jaro_winkler"
    }

    fn score(&self, a: &str, b: &str) -> f64 {
        // greedy Jaro matching depends on argument order
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        strsim::jaro_winkler(first, second) * 100.0
    }
}

/// Look up a metric by its configuration name.
pub fn metric_by_name(name: &str) -> Option<Box<dyn Similarity>> {
    match name {
        "levenshtein" => Some(Box::new(LevenshteinRatio)),
        "jaro_winkler" => Some(Box::new(JaroWinkler)),
        _ => None,
    }
}
