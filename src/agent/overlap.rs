//! Bag-of-tokens cosine ranker.
//!
//! Untrained baseline for the ranking seam: context and memories are
//! pooled into one term-count vector and each candidate is scored by
//! cosine similarity against it. Special tokens are ignored.

use std::collections::HashMap;

use ndarray::Array1;

use super::model::{RankingInput, RankingModel};
use super::observation::TokenIds;
use crate::core::errors::AgentError;

pub struct OverlapRanker {
    ignored: Vec<u32>,
}

impl OverlapRanker {
    /// `ignored` ids (start/end/null markers) never contribute to a score.
    pub fn new(ignored: Vec<u32>) -> Self {
        Self { ignored }
    }

    fn counts<'a>(
        &self,
        vocab: &mut HashMap<u32, usize>,
        sequences: impl IntoIterator<Item = &'a [u32]>,
    ) -> HashMap<usize, f32> {
        let mut counts = HashMap::new();
        for sequence in sequences {
            for token in sequence {
                if self.ignored.contains(token) {
                    continue;
                }
                let next = vocab.len();
                let slot = *vocab.entry(*token).or_insert(next);
                *counts.entry(slot).or_insert(0.0) += 1.0;
            }
        }
        counts
    }
}

impl RankingModel for OverlapRanker {
    fn name(&self) -> &str {
        "overlap"
    }

    fn score(&self, input: RankingInput<'_>, candidates: &[TokenIds]) -> Result<Vec<f32>, AgentError> {
        let mut vocab: HashMap<u32, usize> = HashMap::new();
        let query = self.counts(
            &mut vocab,
            std::iter::once(input.context).chain(input.memories.iter().map(Vec::as_slice)),
        );
        let candidate_counts: Vec<_> = candidates
            .iter()
            .map(|candidate| self.counts(&mut vocab, std::iter::once(candidate.as_slice())))
            .collect();

        let dim = vocab.len();
        let query = dense(&query, dim);
        Ok(candidate_counts
            .iter()
            .map(|counts| cosine_similarity(&query, &dense(counts, dim)))
            .collect())
    }
}

fn dense(counts: &HashMap<usize, f32>, dim: usize) -> Array1<f32> {
    let mut vector = Array1::<f32>::zeros(dim);
    for (&slot, &count) in counts {
        vector[slot] = count;
    }
    vector
}

pub fn cosine_similarity(query: &Array1<f32>, candidate: &Array1<f32>) -> f32 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }
    let dot = query.dot(candidate);
    let denom = query.dot(query).sqrt() * candidate.dot(candidate).sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bags_score_one() {
        let a = Array1::from(vec![1.0, 2.0, 0.0]);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let a = Array1::from(vec![0.0, 0.0]);
        let b = Array1::from(vec![1.0, 0.0]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn overlapping_candidate_scores_highest() {
        let model = OverlapRanker::new(vec![1, 2]);
        let input = RankingInput {
            context: &[10, 11, 12],
            memories: &[vec![20]],
        };
        let candidates = vec![vec![1, 30, 31, 2], vec![1, 10, 20, 2], vec![1, 11, 2]];
        let scores = model.score(input, &candidates).unwrap();
        assert_eq!(scores[0], 0.0);
        assert!(scores[1] > scores[2]);
    }
}
