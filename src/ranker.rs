// src/ranker.rs
//! Merges suggestion lists into one ordered, duplicate-free list.

use std::collections::HashSet;

use crate::types::Suggestion;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct SuggestionRanker {
    similarity_threshold: f64,
}

impl Default for SuggestionRanker {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl SuggestionRanker {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Concatenates `lists` in order, drops near-duplicates (the earliest
    /// survivor of each cluster is kept) and sorts by impact weight ×
    /// confidence, descending. The sort is stable and the whole operation is
    /// idempotent.
    pub fn merge(&self, lists: &[Vec<Suggestion>]) -> Vec<Suggestion> {
        let mut kept: Vec<(Suggestion, HashSet<String>)> = Vec::new();

        for suggestion in lists.iter().flatten() {
            let words = word_set(&suggestion.message);
            let duplicate = kept
                .iter()
                .any(|(_, other)| set_similarity(&words, other) > self.similarity_threshold);
            if !duplicate {
                kept.push((suggestion.clone(), words));
            }
        }

        let mut merged: Vec<Suggestion> = kept.into_iter().map(|(s, _)| s).collect();
        merged.sort_by(|a, b| b.score().total_cmp(&a.score()));
        merged
    }

    pub fn are_similar(&self, a: &str, b: &str) -> bool {
        similarity(a, b) > self.similarity_threshold
    }
}

/// Word-overlap similarity in `[0, 1]`: shared lowercase words over the
/// larger word count. Symmetric; two messages without words are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    set_similarity(&word_set(a), &word_set(b))
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn set_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / larger as f64
}
