use clap::{ArgAction, Args};
use serde_json::{json, Map, Value};

use crate::core::config::{CandidateSource, ReplySource};

/// Agent flags. An omitted flag leaves the config file (or built-in) value.
#[derive(Args, Debug, Clone, Default)]
#[command(next_help_heading = "Knowledge Ranker Arguments")]
pub struct AgentArgs {
    /// Use the knowledge field instead of personas
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub use_knowledge: Option<bool>,

    /// Drop out some knowledge during training
    #[arg(long, value_name = "PROB")]
    pub knowledge_dropout: Option<f64>,

    /// Instead of using all knowledge, use the gold label, i.e. the chosen sentence
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub chosen_sentence: Option<bool>,

    /// Join history lines with this token
    #[arg(long, value_name = "TOKEN")]
    pub join_history_tok: Option<String>,

    /// Use the model in data parallel, requires multiple devices
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub data_parallel: Option<bool>,

    /// Candidate source at evaluation time
    #[arg(long, value_enum)]
    pub eval_candidates: Option<CandidateSource>,

    #[arg(long)]
    pub learningrate: Option<f64>,

    #[arg(long)]
    pub lr_factor: Option<f64>,

    /// Truncate vectorized text to this many tokens; negative disables
    #[arg(long, allow_negative_numbers = true)]
    pub truncate: Option<i64>,

    /// Number of history lines kept; negative keeps the whole episode
    #[arg(long, allow_negative_numbers = true)]
    pub history_size: Option<i64>,

    /// Prefix history lines with speaker tokens
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub person_tokens: Option<bool>,

    /// Put the speaker token after the last newline of an utterance
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub add_p1_after_newln: Option<bool>,

    /// Which previous reply is added to the history
    #[arg(long, value_enum)]
    pub use_reply: Option<ReplySource>,

    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub no_cuda: Option<bool>,

    /// Seed for knowledge dropout
    #[arg(long)]
    pub random_seed: Option<u64>,
}

impl AgentArgs {
    /// Explicitly given flags as a config overlay of the form
    /// `{"agent": {...}}`.
    pub fn to_overrides(&self) -> Value {
        let mut agent = Map::new();
        let mut set = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                agent.insert(key.to_string(), value);
            }
        };

        set("use_knowledge", self.use_knowledge.map(Value::from));
        set("knowledge_dropout", self.knowledge_dropout.map(Value::from));
        set("chosen_sentence", self.chosen_sentence.map(Value::from));
        set("join_history_tok", self.join_history_tok.clone().map(Value::from));
        set("data_parallel", self.data_parallel.map(Value::from));
        set("eval_candidates", self.eval_candidates.map(|c| json!(c)));
        set("learningrate", self.learningrate.map(Value::from));
        set("lr_factor", self.lr_factor.map(Value::from));
        set("truncate", self.truncate.map(non_negative));
        set("history_size", self.history_size.map(non_negative));
        set("person_tokens", self.person_tokens.map(Value::from));
        set("add_p1_after_newln", self.add_p1_after_newln.map(Value::from));
        set("use_reply", self.use_reply.map(|r| json!(r)));
        set("no_cuda", self.no_cuda.map(Value::from));
        set("random_seed", self.random_seed.map(Value::from));

        json!({ "agent": agent })
    }
}

fn non_negative(value: i64) -> Value {
    if value < 0 {
        Value::Null
    } else {
        Value::from(value)
    }
}
