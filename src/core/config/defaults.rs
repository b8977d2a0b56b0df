pub const KNOWLEDGE_DROPOUT: f64 = 0.7;
pub const JOIN_HISTORY_TOK: &str = " ";
pub const LEARNING_RATE: f64 = 0.0008;
pub const LR_FACTOR: f64 = 1.0;
pub const TRUNCATE: usize = 1024;

pub const CONFIG_FILE_NAME: &str = "config.yml";
pub const DATA_DIR_ENV: &str = "KNOWLEDGE_RANKER_DATA_DIR";
pub const CONFIG_PATH_ENV: &str = "KNOWLEDGE_RANKER_CONFIG_PATH";
