pub mod args;
pub mod dictionary;
pub mod factory;
pub mod hf_tokenizer;
pub mod history;
pub mod knowledge;
pub mod model;
pub mod observation;
pub mod overlap;
pub mod ranker;
pub mod vectorizer;


pub use args::AgentArgs;
pub use dictionary::Dictionary;
pub use factory::BaselineFactory;
pub use history::{DialogHistory, HistoryBuilder, HistoryOptions};
pub use knowledge::{KnowledgeSelector, SelectionPolicy};
pub use model::{DataParallel, ModelFactory, RankingInput, RankingModel};
pub use observation::{Observation, TokenIds};
pub use ranker::{KnowledgeRankerAgent, Reply, SharedAgentState};
pub use vectorizer::{TextVectorizer, TruncateSide};
