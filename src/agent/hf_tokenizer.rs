use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;

use super::observation::TokenIds;
use super::vectorizer::TextVectorizer;
use crate::core::errors::AgentError;

/// Vectorizer backed by a HuggingFace `tokenizer.json`.
pub struct HfTokenizerVectorizer {
    tokenizer: HfTokenizer,
    start_idx: Option<u32>,
    end_idx: Option<u32>,
}

impl HfTokenizerVectorizer {
    /// Loads the tokenizer and resolves the start / end markers by name.
    /// Markers missing from the vocabulary are simply not inserted.
    pub fn from_file(path: &Path, start_token: &str, end_token: &str) -> Result<Self, AgentError> {
        let tokenizer = HfTokenizer::from_file(path)
            .map_err(|e| AgentError::vectorizer(format!("failed loading tokenizer: {e}")))?;
        let start_idx = tokenizer.token_to_id(start_token);
        let end_idx = tokenizer.token_to_id(end_token);
        if start_idx.is_none() || end_idx.is_none() {
            tracing::warn!(
                start = start_token,
                end = end_token,
                "tokenizer lacks start/end markers; vectors will omit them"
            );
        }
        tracing::info!(
            path = %path.display(),
            vocab = tokenizer.get_vocab_size(true),
            "tokenizer loaded"
        );
        Ok(Self {
            tokenizer,
            start_idx,
            end_idx,
        })
    }
}

impl TextVectorizer for HfTokenizerVectorizer {
    fn txt2vec(&self, text: &str) -> Result<TokenIds, AgentError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(AgentError::vectorizer)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn start_idx(&self) -> Option<u32> {
        self.start_idx
    }

    fn end_idx(&self) -> Option<u32> {
        self.end_idx
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::agent::vectorizer::TruncateSide;

    /// Writes a whitespace-split WordLevel `tokenizer.json` with `tokens`
    /// numbered in order.
    fn word_level_tokenizer(dir: &Path, tokens: &[&str]) -> PathBuf {
        let vocab: Map<String, Value> = tokens
            .iter()
            .enumerate()
            .map(|(idx, token)| (token.to_string(), json!(idx)))
            .collect();
        let tokenizer = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]"}
        });
        let path = dir.join("tokenizer.json");
        std::fs::write(&path, tokenizer.to_string()).unwrap();
        path
    }

    #[test]
    fn markers_are_resolved_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = word_level_tokenizer(
            dir.path(),
            &["[UNK]", "[CLS]", "[SEP]", "hello", "world"],
        );
        let vectorizer = HfTokenizerVectorizer::from_file(&path, "[CLS]", "[SEP]").unwrap();

        assert_eq!(vectorizer.start_idx(), Some(1));
        assert_eq!(vectorizer.end_idx(), Some(2));
        assert_eq!(
            vectorizer
                .vectorize_text("hello world", true, true, None, TruncateSide::Right)
                .unwrap(),
            vec![1, 3, 4, 2]
        );
    }

    #[test]
    fn encoding_adds_no_special_tokens_on_its_own() {
        let dir = tempfile::tempdir().unwrap();
        let path = word_level_tokenizer(
            dir.path(),
            &["[UNK]", "[CLS]", "[SEP]", "hello", "world"],
        );
        let vectorizer = HfTokenizerVectorizer::from_file(&path, "[CLS]", "[SEP]").unwrap();

        assert_eq!(vectorizer.txt2vec("hello there world").unwrap(), vec![3, 0, 4]);
        assert_eq!(
            vectorizer
                .vectorize_text("world hello world", false, false, Some(2), TruncateSide::Left)
                .unwrap(),
            vec![3, 4]
        );
    }

    #[test]
    fn missing_markers_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = word_level_tokenizer(dir.path(), &["[UNK]", "hello", "world"]);
        let vectorizer = HfTokenizerVectorizer::from_file(&path, "[CLS]", "[SEP]").unwrap();

        assert_eq!(vectorizer.start_idx(), None);
        assert_eq!(vectorizer.end_idx(), None);
        assert_eq!(
            vectorizer
                .vectorize_text("hello world", true, true, None, TruncateSide::Right)
                .unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn unreadable_file_is_a_vectorizer_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = HfTokenizerVectorizer::from_file(&dir.path().join("absent.json"), "[CLS]", "[SEP]");
        assert!(matches!(result, Err(AgentError::Vectorizer(_))));
    }
}
