//! Seam between the agent and the ranking model it drives.
//!
//! The agent never looks inside the model: it hands over the vectorized
//! context, memories and candidates and gets one score per candidate back.

use std::sync::Arc;

use super::observation::TokenIds;
use super::vectorizer::TextVectorizer;
use crate::core::config::AgentConfig;
use crate::core::errors::AgentError;

/// Vectorized inputs for scoring one turn.
#[derive(Debug, Clone, Copy)]
pub struct RankingInput<'a> {
    pub context: &'a [u32],
    pub memories: &'a [TokenIds],
}

pub trait RankingModel: Send + Sync {
    fn name(&self) -> &str;

    /// One score per candidate, higher is better.
    fn score(&self, input: RankingInput<'_>, candidates: &[TokenIds]) -> Result<Vec<f32>, AgentError>;
}

/// Candidate indices ordered by descending score; ties keep input order.
/// NaN scores rank last.
pub fn rank_descending(scores: &[f32]) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|left, right| sort_key(right.1).total_cmp(&sort_key(left.1)));
    ranked
}

fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Builds what a primary agent owns. Replicas never call into it.
pub trait ModelFactory {
    fn build_vectorizer(&self, config: &AgentConfig) -> Result<Arc<dyn TextVectorizer>, AgentError>;

    fn build_model(
        &self,
        config: &AgentConfig,
        vectorizer: &Arc<dyn TextVectorizer>,
    ) -> Result<Arc<dyn RankingModel>, AgentError>;

    /// Number of accelerator devices visible to the model.
    fn device_count(&self) -> usize {
        0
    }
}

/// Splits candidate scoring across `replicas` scoped threads and stitches
/// the scores back together in candidate order.
pub struct DataParallel {
    inner: Arc<dyn RankingModel>,
    replicas: usize,
    name: String,
}

impl DataParallel {
    pub fn new(inner: Arc<dyn RankingModel>, replicas: usize) -> Self {
        let name = format!("data_parallel({})", inner.name());
        Self {
            inner,
            replicas: replicas.max(1),
            name,
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl RankingModel for DataParallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, input: RankingInput<'_>, candidates: &[TokenIds]) -> Result<Vec<f32>, AgentError> {
        if self.replicas == 1 || candidates.len() < 2 {
            return self.inner.score(input, candidates);
        }

        let chunk_size = candidates.len().div_ceil(self.replicas);
        let chunk_scores = std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .chunks(chunk_size)
                .map(|chunk| {
                    let inner = &self.inner;
                    scope.spawn(move || inner.score(input, chunk))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| AgentError::model("replica thread panicked"))?
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        let scores: Vec<f32> = chunk_scores.into_iter().flatten().collect();
        if scores.len() != candidates.len() {
            return Err(AgentError::model(format!(
                "replicas returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Scores a candidate by its first token id and counts invocations.
    struct FirstTokenModel {
        calls: AtomicUsize,
    }

    impl RankingModel for FirstTokenModel {
        fn name(&self) -> &str {
            "first_token"
        }

        fn score(&self, _input: RankingInput<'_>, candidates: &[TokenIds]) -> Result<Vec<f32>, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(candidates
                .iter()
                .map(|c| c.first().copied().unwrap_or(0) as f32)
                .collect())
        }
    }

    #[test]
    fn data_parallel_matches_single_replica_scores() {
        let inner = Arc::new(FirstTokenModel {
            calls: AtomicUsize::new(0),
        });
        let candidates: Vec<TokenIds> = (0..7).map(|i| vec![i * 3]).collect();
        let input = RankingInput {
            context: &[1, 2],
            memories: &[],
        };

        let single = inner.score(input, &candidates).unwrap();
        let parallel = DataParallel::new(inner.clone(), 3);
        let split = parallel.score(input, &candidates).unwrap();

        assert_eq!(single, split);
        // one direct call plus one per chunk
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1 + 3);
        assert_eq!(parallel.name(), "data_parallel(first_token)");
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let ranked = rank_descending(&[0.5, 0.9, 0.5]);
        assert_eq!(ranked.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 0, 2]);
    }

    #[test]
    fn nan_scores_rank_last_without_panicking() {
        let scores: Vec<f32> = (0..64)
            .map(|i| if i % 5 == 0 { f32::NAN } else { i as f32 })
            .collect();
        let ranked = rank_descending(&scores);

        assert_eq!(ranked.len(), 64);
        assert_eq!(ranked[0].0, 63);
        let first_nan = ranked.iter().position(|(_, s)| s.is_nan()).unwrap();
        assert!(ranked[first_nan..].iter().all(|(_, s)| s.is_nan()));
        // NaN entries keep their input order
        let nan_indices: Vec<usize> = ranked[first_nan..].iter().map(|(i, _)| *i).collect();
        assert_eq!(nan_indices, (0..64).step_by(5).collect::<Vec<_>>());
    }

    #[test]
    fn zero_replicas_behaves_like_one() {
        let inner = Arc::new(FirstTokenModel {
            calls: AtomicUsize::new(0),
        });
        let parallel = DataParallel::new(inner, 0);
        assert_eq!(parallel.replicas(), 1);
    }
}
