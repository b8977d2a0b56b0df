use super::observation::TokenIds;
use crate::core::errors::AgentError;

/// Which end of an over-long sequence survives truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateSide {
    /// Drop leading tokens, keep the most recent ones.
    Left,
    /// Drop trailing tokens.
    Right,
}

/// Turns text into token ids.
///
/// Implementors only provide tokenization and their special ids; marker
/// insertion and truncation are shared through `vectorize_text`.
pub trait TextVectorizer: Send + Sync {
    fn txt2vec(&self, text: &str) -> Result<TokenIds, AgentError>;

    fn start_idx(&self) -> Option<u32>;

    fn end_idx(&self) -> Option<u32>;

    fn vectorize_text(
        &self,
        text: &str,
        add_start: bool,
        add_end: bool,
        truncate: Option<usize>,
        side: TruncateSide,
    ) -> Result<TokenIds, AgentError> {
        let mut vec = self.txt2vec(text)?;
        if add_start {
            if let Some(start) = self.start_idx() {
                vec.insert(0, start);
            }
        }
        if add_end {
            if let Some(end) = self.end_idx() {
                vec.push(end);
            }
        }
        Ok(truncate_vec(vec, truncate, side))
    }
}

pub fn truncate_vec(mut vec: TokenIds, truncate: Option<usize>, side: TruncateSide) -> TokenIds {
    let Some(limit) = truncate else {
        return vec;
    };
    if vec.len() <= limit {
        return vec;
    }
    match side {
        TruncateSide::Left => vec.split_off(vec.len() - limit),
        TruncateSide::Right => {
            vec.truncate(limit);
            vec
        }
    }
}
