use std::collections::HashSet;

// Words too common in bot output to say anything about overlap
const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "but", "is", "are", "was", "were", "crypto", "coin", "token", "dyor",
];

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Lexical near-duplicate check between a new post and the previous one.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityGate {
    threshold: f64,
}

impl Default for SimilarityGate {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl SimilarityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True when the Jaccard index of the two texts' significant words
    /// exceeds the threshold. Missing history never counts as similar.
    pub fn is_similar(&self, candidate: &str, previous: &str) -> bool {
        if candidate.trim().is_empty() || previous.trim().is_empty() {
            return false;
        }
        let ratio = jaccard(&significant_words(candidate), &significant_words(previous));
        tracing::debug!(similarity = ratio, threshold = self.threshold, "content similarity");
        ratio > self.threshold
    }
}

pub fn significant_words(text: &str) -> HashSet<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    normalized
        .split_whitespace()
        .filter(|word| word.len() > 3 && !STOP_WORDS.contains(word))
        .map(str::to_owned)
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
