use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Where ranking candidates come from for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// The labels travelling with the current batch.
    Batch,
    /// `label_candidates` attached to the observation.
    Inline,
    /// A fixed candidate file loaded at start-up.
    Fixed,
    /// Every token of the dictionary.
    Vocab,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CandidateSource::Batch => "batch",
            CandidateSource::Inline => "inline",
            CandidateSource::Fixed => "fixed",
            CandidateSource::Vocab => "vocab",
        };
        f.write_str(name)
    }
}

/// Which previous reply is folded back into the dialogue history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Label,
    Model,
}

/// Every option the knowledge ranking agent recognises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Use the knowledge field as memories.
    pub use_knowledge: bool,
    /// Probability of dropping each knowledge line during training.
    pub knowledge_dropout: f64,
    /// Use only the gold (checked) sentence instead of all knowledge.
    pub chosen_sentence: bool,
    /// Separator placed between history lines.
    pub join_history_tok: String,
    /// Spread candidate scoring over every available device.
    pub data_parallel: bool,
    pub candidates: CandidateSource,
    pub eval_candidates: CandidateSource,
    pub learningrate: f64,
    pub lr_factor: f64,
    /// Maximum token length of any vectorized text. `None` disables truncation.
    pub truncate: Option<usize>,
    /// Number of history lines kept. `None` keeps the whole episode.
    pub history_size: Option<usize>,
    pub person_tokens: bool,
    pub add_p1_after_newln: bool,
    pub use_reply: ReplySource,
    pub no_cuda: bool,
    pub random_seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            use_knowledge: true,
            knowledge_dropout: defaults::KNOWLEDGE_DROPOUT,
            chosen_sentence: false,
            join_history_tok: defaults::JOIN_HISTORY_TOK.to_string(),
            data_parallel: false,
            candidates: CandidateSource::Batch,
            eval_candidates: CandidateSource::Inline,
            learningrate: defaults::LEARNING_RATE,
            lr_factor: defaults::LR_FACTOR,
            truncate: Some(defaults::TRUNCATE),
            history_size: None,
            person_tokens: false,
            add_p1_after_newln: false,
            use_reply: ReplySource::Label,
            no_cuda: false,
            random_seed: None,
        }
    }
}

/// Options consumed by dataset builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataOptions {
    pub datapath: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub datapath: Option<PathBuf>,
}

/// Root of `config.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub data: DataSection,
}
