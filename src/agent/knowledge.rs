//! Knowledge selection and vectorization.
//!
//! Decides which knowledge lines of a turn become memories for the ranking
//! model, then turns each selected line into token ids.

use rand::Rng;

use super::observation::Observation;
use super::vectorizer::{TextVectorizer, TruncateSide};
use crate::core::config::AgentConfig;
use crate::core::errors::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Knowledge is not used; memories are always empty.
    Disabled,
    /// Only the gold sentence.
    GoldOnly,
    /// Every candidate line.
    All,
    /// Gold sentence plus a random subset of the candidate lines.
    Dropout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeSelector {
    use_knowledge: bool,
    chosen_sentence: bool,
    knowledge_dropout: f64,
    truncate: Option<usize>,
}

impl KnowledgeSelector {
    /// `knowledge_dropout` is clamped into `[0, 1]`; NaN means no dropout.
    pub fn new(
        use_knowledge: bool,
        chosen_sentence: bool,
        knowledge_dropout: f64,
        truncate: Option<usize>,
    ) -> Self {
        let knowledge_dropout = if knowledge_dropout.is_nan() {
            0.0
        } else {
            knowledge_dropout.clamp(0.0, 1.0)
        };
        Self {
            use_knowledge,
            chosen_sentence: chosen_sentence && use_knowledge,
            knowledge_dropout,
            truncate,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.use_knowledge,
            config.chosen_sentence,
            config.knowledge_dropout,
            config.truncate,
        )
    }

    pub fn use_knowledge(&self) -> bool {
        self.use_knowledge
    }

    /// Gold-only mode; never on without knowledge.
    pub fn chosen_sentence(&self) -> bool {
        self.chosen_sentence
    }

    pub fn knowledge_dropout(&self) -> f64 {
        self.knowledge_dropout
    }

    pub fn policy_for(&self, observation: &Observation) -> SelectionPolicy {
        if !self.use_knowledge {
            return SelectionPolicy::Disabled;
        }
        if observation.checked_sentence().is_some() && self.chosen_sentence {
            return SelectionPolicy::GoldOnly;
        }
        // dropout never applies at evaluation time
        if self.knowledge_dropout == 0.0 || observation.has_eval_labels() {
            return SelectionPolicy::All;
        }
        SelectionPolicy::Dropout
    }

    /// Knowledge lines to vectorize, in order.
    pub fn select<'o, R>(&self, observation: &'o Observation, rng: &mut R) -> Vec<&'o str>
    where
        R: Rng + ?Sized,
    {
        match self.policy_for(observation) {
            SelectionPolicy::Disabled => Vec::new(),
            SelectionPolicy::GoldOnly => observation.checked_sentence().into_iter().collect(),
            SelectionPolicy::All => observation.knowledge_lines(),
            SelectionPolicy::Dropout => {
                debug_assert!(!observation.has_eval_labels());
                let keep_prob = 1.0 - self.knowledge_dropout;
                let mut selected: Vec<&str> = observation.checked_sentence().into_iter().collect();
                for line in observation.knowledge_lines() {
                    if rng.random_bool(keep_prob) {
                        selected.push(line);
                    }
                }
                selected
            }
        }
    }

    /// Fills `memory_vecs` with one vector per selected knowledge line.
    /// `memory_vecs` is always set, empty when nothing was selected.
    pub fn vectorize_knowledge<R>(
        &self,
        mut observation: Observation,
        vectorizer: &dyn TextVectorizer,
        rng: &mut R,
    ) -> Result<Observation, AgentError>
    where
        R: Rng + ?Sized,
    {
        observation.memory_vecs = Some(Vec::new());
        if !self.use_knowledge {
            return Ok(observation);
        }

        let memory_vecs = self
            .select(&observation, rng)
            .into_iter()
            .map(|line| vectorizer.vectorize_text(line, false, false, self.truncate, TruncateSide::Left))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::trace!(memories = memory_vecs.len(), "knowledge vectorized");

        observation.memory_vecs = Some(memory_vecs);
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::agent::dictionary::Dictionary;

    const KNOWLEDGE: &str = "fact1\nfact2\nfact3\n";

    fn turn() -> Observation {
        Observation::new("tell me something")
            .with_knowledge(KNOWLEDGE)
            .with_checked_sentence("gold fact")
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn disabled_knowledge_yields_empty_memories() {
        let selector = KnowledgeSelector::new(false, true, 0.0, None);
        let dict = Dictionary::from_corpus([KNOWLEDGE]);
        let obs = selector
            .vectorize_knowledge(turn().with_eval_labels(vec!["x".into()]), &dict, &mut rng())
            .unwrap();
        assert_eq!(obs.memory_vecs, Some(vec![]));
    }

    #[test]
    fn chosen_sentence_requires_knowledge() {
        let selector = KnowledgeSelector::new(false, true, 0.5, None);
        assert!(!selector.chosen_sentence());
    }

    #[test]
    fn gold_only_overrides_dropout_and_knowledge() {
        for dropout in [0.0, 0.7, 1.0] {
            let selector = KnowledgeSelector::new(true, true, dropout, None);
            assert_eq!(selector.select(&turn(), &mut rng()), vec!["gold fact"]);
        }
    }

    #[test]
    fn gold_only_without_gold_falls_through() {
        let selector = KnowledgeSelector::new(true, true, 0.0, None);
        let obs = Observation::new("hi").with_knowledge(KNOWLEDGE);
        assert_eq!(selector.policy_for(&obs), SelectionPolicy::All);
        assert_eq!(selector.select(&obs, &mut rng()), vec!["fact1", "fact2", "fact3"]);
    }

    #[test]
    fn zero_dropout_selects_all_lines_regardless_of_eval_labels() {
        let selector = KnowledgeSelector::new(true, false, 0.0, None);
        let train = turn().with_labels(vec!["reply".into()]);
        let eval = turn().with_eval_labels(vec!["reply".into()]);
        for obs in [train, eval] {
            assert_eq!(selector.select(&obs, &mut rng()), vec!["fact1", "fact2", "fact3"]);
        }
    }

    #[test]
    fn eval_labels_disable_dropout() {
        let selector = KnowledgeSelector::new(true, false, 0.9, None);
        let obs = turn().with_eval_labels(vec!["reply".into()]);
        assert_eq!(selector.policy_for(&obs), SelectionPolicy::All);
        assert_eq!(selector.select(&obs, &mut rng()), vec!["fact1", "fact2", "fact3"]);
    }

    #[test]
    fn empty_eval_labels_still_count_as_evaluation() {
        let selector = KnowledgeSelector::new(true, false, 0.9, None);
        let obs = turn().with_eval_labels(vec![]);
        assert_eq!(selector.policy_for(&obs), SelectionPolicy::All);
    }

    #[test]
    fn full_dropout_keeps_only_gold() {
        let selector = KnowledgeSelector::new(true, false, 1.0, None);
        let obs = turn().with_labels(vec!["reply".into()]);
        assert_eq!(selector.policy_for(&obs), SelectionPolicy::Dropout);
        assert_eq!(selector.select(&obs, &mut rng()), vec!["gold fact"]);
    }

    #[test]
    fn out_of_range_dropout_is_clamped() {
        let obs = turn().with_labels(vec!["reply".into()]);

        let above = KnowledgeSelector::new(true, false, 1.5, None);
        assert_eq!(above.knowledge_dropout(), 1.0);
        assert_eq!(above.select(&obs, &mut rng()), vec!["gold fact"]);

        let below = KnowledgeSelector::new(true, false, -0.5, None);
        assert_eq!(below.knowledge_dropout(), 0.0);
        assert_eq!(below.policy_for(&obs), SelectionPolicy::All);

        let nan = KnowledgeSelector::new(true, false, f64::NAN, None);
        assert_eq!(nan.select(&obs, &mut rng()), vec!["fact1", "fact2", "fact3"]);
    }

    #[test]
    fn dropout_is_reproducible_with_a_fixed_seed() {
        let selector = KnowledgeSelector::new(true, false, 0.5, None);
        let knowledge: String = (0..64).map(|i| format!("line{}\n", i)).collect();
        let obs = Observation::new("hi").with_knowledge(knowledge);

        let first = selector.select(&obs, &mut StdRng::seed_from_u64(42));
        let second = selector.select(&obs, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);

        // selection is an ordered subsequence of the candidate lines
        let lines = obs.knowledge_lines();
        let mut cursor = lines.iter();
        for picked in &first {
            assert!(cursor.any(|line| line == picked));
        }
    }

    #[test]
    fn dropout_rate_is_roughly_respected() {
        let selector = KnowledgeSelector::new(true, false, 0.5, None);
        let knowledge: String = (0..2000).map(|i| format!("l{}\n", i)).collect();
        let obs = Observation::new("hi").with_knowledge(knowledge);
        let kept = selector.select(&obs, &mut StdRng::seed_from_u64(3)).len();
        assert!((800..1200).contains(&kept), "kept {kept}");
    }

    #[test]
    fn empty_knowledge_yields_empty_memories() {
        let selector = KnowledgeSelector::new(true, false, 0.0, None);
        let dict = Dictionary::new();
        let obs = selector
            .vectorize_knowledge(Observation::new("hi").with_knowledge(""), &dict, &mut rng())
            .unwrap();
        assert_eq!(obs.memory_vecs, Some(vec![]));
    }

    #[test]
    fn memories_are_truncated_keeping_the_tail() {
        let selector = KnowledgeSelector::new(true, false, 0.0, Some(2));
        let dict = Dictionary::from_corpus(["a b c"]);
        let obs = selector
            .vectorize_knowledge(Observation::new("hi").with_knowledge("a b c\n"), &dict, &mut rng())
            .unwrap();
        assert_eq!(obs.memory_vecs, Some(vec![vec![5, 6]]));
    }
}
