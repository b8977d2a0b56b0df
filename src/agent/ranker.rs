//! Ranking agent that feeds knowledge sentences to the model as memories.
//!
//! Per turn the agent rebuilds the dialogue history, selects and
//! vectorizes knowledge, vectorizes text / label / candidates, and on
//! `act` asks the ranking model to order the candidates.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::history::{DialogHistory, HistoryBuilder, HistoryOptions};
use super::knowledge::KnowledgeSelector;
use super::model::{rank_descending, DataParallel, ModelFactory, RankingInput, RankingModel};
use super::observation::{Observation, TokenIds};
use super::vectorizer::{TextVectorizer, TruncateSide};
use crate::core::config::validation::validate_agent_config;
use crate::core::config::{AgentConfig, CandidateSource, ReplySource};
use crate::core::errors::AgentError;

/// What a primary agent hands to its replicas. Read-only once built.
#[derive(Clone)]
pub struct SharedAgentState {
    pub model: Arc<dyn RankingModel>,
    pub vectorizer: Arc<dyn TextVectorizer>,
    pub data_parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub text_candidates: Vec<String>,
    pub episode_done: bool,
}

pub struct KnowledgeRankerAgent {
    config: AgentConfig,
    model: Arc<dyn RankingModel>,
    vectorizer: Arc<dyn TextVectorizer>,
    history: Box<dyn HistoryBuilder>,
    selector: KnowledgeSelector,
    use_memories: bool,
    data_parallel: bool,
    is_replica: bool,
    rng: StdRng,
    observation: Option<Observation>,
    last_model_reply: Option<String>,
}

impl KnowledgeRankerAgent {
    pub const ID: &'static str = "KnowledgeRanker";

    /// Builds a primary agent (no `shared`) or a replica of one.
    ///
    /// Only the primary consults `factory`: it builds the vectorizer and
    /// model and, when data parallelism is requested and devices are
    /// available, wraps the model so candidate scoring is split across
    /// them. Candidate sampling during training is always `batch`.
    pub fn new(
        mut config: AgentConfig,
        shared: Option<SharedAgentState>,
        factory: &dyn ModelFactory,
    ) -> Result<Self, AgentError> {
        config.candidates = CandidateSource::Batch;
        validate_agent_config(&config)?;

        let selector = KnowledgeSelector::from_config(&config);
        let use_memories = selector.use_knowledge();

        let (model, vectorizer, data_parallel, is_replica) = match shared {
            Some(shared) => (shared.model, shared.vectorizer, shared.data_parallel, true),
            None => {
                let devices = factory.device_count();
                let use_cuda = !config.no_cuda && devices > 0;
                let data_parallel = config.data_parallel && use_cuda;

                let vectorizer = factory.build_vectorizer(&config)?;
                let mut model = factory.build_model(&config, &vectorizer)?;
                if data_parallel {
                    model = Arc::new(DataParallel::new(model, devices));
                }
                (model, vectorizer, data_parallel, false)
            }
        };

        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        tracing::info!(
            model = model.name(),
            replica = is_replica,
            use_knowledge = selector.use_knowledge(),
            chosen_sentence = selector.chosen_sentence(),
            knowledge_dropout = selector.knowledge_dropout(),
            data_parallel,
            "knowledge ranker ready"
        );

        Ok(Self {
            config,
            model,
            vectorizer,
            history: Box::new(DialogHistory::new()),
            selector,
            use_memories,
            data_parallel,
            is_replica,
            rng,
            observation: None,
            last_model_reply: None,
        })
    }

    /// Replaces the random source used for knowledge dropout and label
    /// choice.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_history(mut self, history: Box<dyn HistoryBuilder>) -> Self {
        self.history = history;
        self
    }

    pub fn share(&self) -> SharedAgentState {
        SharedAgentState {
            model: Arc::clone(&self.model),
            vectorizer: Arc::clone(&self.vectorizer),
            data_parallel: self.data_parallel,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn use_knowledge(&self) -> bool {
        self.selector.use_knowledge()
    }

    pub fn use_memories(&self) -> bool {
        self.use_memories
    }

    pub fn chosen_sentence(&self) -> bool {
        self.selector.chosen_sentence()
    }

    pub fn data_parallel(&self) -> bool {
        self.data_parallel
    }

    pub fn is_replica(&self) -> bool {
        self.is_replica
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// The most recently observed (fully vectorized) turn.
    pub fn observation(&self) -> Option<&Observation> {
        self.observation.as_ref()
    }

    /// Previous reply to fold into the history, if the episode is ongoing.
    ///
    /// With `use_label` the previous turn's first label wins; otherwise, or
    /// when it had none, the model's own last reply is used.
    pub fn last_reply(&self, use_label: bool) -> Option<String> {
        let previous = self.observation.as_ref()?;
        if previous.episode_done {
            return None;
        }
        if use_label {
            if let Some(label) = previous.any_labels().and_then(|labels| labels.first()) {
                return Some(label.clone());
            }
        }
        self.last_model_reply.clone()
    }

    pub fn vectorize_knowledge(&mut self, observation: Observation) -> Result<Observation, AgentError> {
        self.selector
            .vectorize_knowledge(observation, self.vectorizer.as_ref(), &mut self.rng)
    }

    /// Base vectorization: history text keeps its most recent tokens, labels
    /// and candidates keep their first tokens and get start/end markers.
    pub fn vectorize(
        &mut self,
        mut observation: Observation,
        add_start: bool,
        add_end: bool,
        truncate: Option<usize>,
    ) -> Result<Observation, AgentError> {
        let vectorizer = self.vectorizer.as_ref();

        if let Some(text) = observation.text.as_deref() {
            observation.text_vec =
                Some(vectorizer.vectorize_text(text, false, false, truncate, TruncateSide::Left)?);
        }

        let label = observation
            .any_labels()
            .and_then(|labels| labels.choose(&mut self.rng))
            .cloned();
        if let Some(label) = label {
            observation.label_vec = Some(vectorizer.vectorize_text(
                &label,
                add_start,
                add_end,
                truncate,
                TruncateSide::Right,
            )?);
        }

        if let Some(candidates) = observation.label_candidates.as_deref() {
            let vecs = candidates
                .iter()
                .map(|c| vectorizer.vectorize_text(c, add_start, add_end, truncate, TruncateSide::Right))
                .collect::<Result<Vec<_>, _>>()?;
            observation.label_candidates_vecs = Some(vecs);
        }

        Ok(observation)
    }

    /// Prepares a new turn: history, knowledge memories, then base vectors.
    /// The result also becomes the agent's current observation.
    pub fn observe(&mut self, observation: Observation) -> Result<Observation, AgentError> {
        let reply = self.last_reply(self.config.use_reply == ReplySource::Label);
        let options = HistoryOptions {
            add_person_tokens: self.config.person_tokens,
            add_p1_after_newln: self.config.add_p1_after_newln,
            join_history_tok: self.config.join_history_tok.clone(),
            history_size: self.config.history_size,
        };

        let observation = self.history.update(observation, reply.as_deref(), &options);
        let observation = self.vectorize_knowledge(observation)?;
        let observation = self.vectorize(observation, true, true, self.config.truncate)?;

        tracing::debug!(
            id = observation.id.as_deref().unwrap_or(""),
            memories = observation.memory_vecs.as_ref().map_or(0, Vec::len),
            episode_done = observation.episode_done,
            "observed turn"
        );
        self.observation = Some(observation.clone());
        Ok(observation)
    }

    /// Ranks the candidates of the current observation.
    pub fn act(&mut self) -> Result<Reply, AgentError> {
        let observation = self.observation.as_ref().ok_or(AgentError::NoObservation)?;

        let training = observation.labels.as_ref().is_some_and(|l| !l.is_empty());
        let source = if training {
            self.config.candidates
        } else {
            self.config.eval_candidates
        };

        let (texts, vecs) = self.candidates_for(observation, source)?;
        let mut reply = Reply {
            id: Self::ID.to_string(),
            text: None,
            text_candidates: Vec::new(),
            episode_done: false,
        };
        if texts.is_empty() {
            tracing::debug!(%source, "no candidates to rank");
            return Ok(reply);
        }

        let input = RankingInput {
            context: observation.text_vec.as_deref().unwrap_or(&[]),
            memories: if self.use_memories {
                observation.memory_vecs.as_deref().unwrap_or(&[])
            } else {
                &[]
            },
        };
        let scores = self.model.score(input, &vecs)?;
        if scores.len() != texts.len() {
            return Err(AgentError::model(format!(
                "model returned {} scores for {} candidates",
                scores.len(),
                texts.len()
            )));
        }

        reply.text_candidates = rank_descending(&scores)
            .into_iter()
            .map(|(idx, _)| texts[idx].clone())
            .collect();
        reply.text = reply.text_candidates.first().cloned();

        self.last_model_reply = reply.text.clone();
        Ok(reply)
    }

    /// Drops the history and the current observation.
    pub fn reset(&mut self) {
        self.history.reset();
        self.observation = None;
        self.last_model_reply = None;
    }

    fn candidates_for(
        &self,
        observation: &Observation,
        source: CandidateSource,
    ) -> Result<(Vec<String>, Vec<TokenIds>), AgentError> {
        let truncate = self.config.truncate;
        let vectorize_all = |texts: &[String]| {
            texts
                .iter()
                .map(|t| {
                    self.vectorizer
                        .vectorize_text(t, true, true, truncate, TruncateSide::Right)
                })
                .collect::<Result<Vec<_>, _>>()
        };

        match source {
            CandidateSource::Batch => {
                let labels = observation.any_labels().unwrap_or(&[]).to_vec();
                let vecs = vectorize_all(&labels)?;
                Ok((labels, vecs))
            }
            CandidateSource::Inline => {
                let texts = observation.label_candidates.clone().unwrap_or_default();
                let vecs = match &observation.label_candidates_vecs {
                    Some(vecs) if vecs.len() == texts.len() => vecs.clone(),
                    _ => vectorize_all(&texts)?,
                };
                Ok((texts, vecs))
            }
            other => Err(AgentError::UnsupportedCandidates(other.to_string())),
        }
    }
}
