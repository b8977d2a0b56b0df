//! Word-level dictionary vectorizer.
//!
//! Tokens are words, single punctuation marks and newlines. The first four
//! ids are reserved for `__null__`, `__start__`, `__end__` and `__unk__`;
//! anything not in the vocabulary maps to `__unk__`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::observation::TokenIds;
use super::vectorizer::TextVectorizer;
use crate::core::errors::AgentError;

pub const NULL_TOKEN: &str = "__null__";
pub const START_TOKEN: &str = "__start__";
pub const END_TOKEN: &str = "__end__";
pub const UNK_TOKEN: &str = "__unk__";

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| Regex::new(r"\w+|[^\w\s]|\n").expect("token pattern is valid"))
}

pub fn tokenize(text: &str) -> Vec<&str> {
    token_regex().find_iter(text).map(|m| m.as_str()).collect()
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    tok2ind: HashMap<String, u32>,
    ind2tok: Vec<String>,
    freq: HashMap<String, u64>,
}

impl Dictionary {
    pub fn new() -> Self {
        let mut dict = Self {
            tok2ind: HashMap::new(),
            ind2tok: Vec::new(),
            freq: HashMap::new(),
        };
        for special in [NULL_TOKEN, START_TOKEN, END_TOKEN, UNK_TOKEN] {
            dict.add_token(special);
        }
        dict
    }

    /// Builds a vocabulary from every token seen in `texts`.
    pub fn from_corpus<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut dict = Self::new();
        for text in texts {
            dict.add_text(text);
        }
        dict
    }

    /// Loads a `token<TAB>count` file, one entry per line. Escaped `\n` and
    /// `\t` sequences are restored.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| AgentError::vectorizer(format!("{}: {}", path.display(), e)))?;
        let mut dict = Self::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (token, count) = match line.split_once('\t') {
                Some((token, count)) => {
                    let count = count.trim().parse::<u64>().map_err(|e| {
                        AgentError::vectorizer(format!(
                            "{}:{}: bad count: {}",
                            path.display(),
                            lineno + 1,
                            e
                        ))
                    })?;
                    (token, count)
                }
                None => (line, 0),
            };
            let token = unescape(token);
            dict.add_token(&token);
            *dict.freq.entry(token).or_insert(0) += count;
        }
        tracing::info!(path = %path.display(), size = dict.len(), "dictionary loaded");
        Ok(dict)
    }

    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        let mut out = String::new();
        for token in &self.ind2tok {
            let count = self.freq.get(token).copied().unwrap_or(0);
            out.push_str(&escape(token));
            out.push('\t');
            out.push_str(&count.to_string());
            out.push('\n');
        }
        fs::write(path, out)
            .map_err(|e| AgentError::vectorizer(format!("{}: {}", path.display(), e)))
    }

    pub fn add_token(&mut self, token: &str) -> u32 {
        if let Some(&idx) = self.tok2ind.get(token) {
            return idx;
        }
        let idx = self.ind2tok.len() as u32;
        self.tok2ind.insert(token.to_string(), idx);
        self.ind2tok.push(token.to_string());
        idx
    }

    pub fn add_text(&mut self, text: &str) {
        for token in tokenize(text) {
            self.add_token(token);
            *self.freq.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.ind2tok.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ind2tok.is_empty()
    }

    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.tok2ind.get(token).copied()
    }

    pub fn token_at(&self, idx: u32) -> Option<&str> {
        self.ind2tok.get(idx as usize).map(String::as_str)
    }

    fn unk_idx(&self) -> u32 {
        self.tok2ind[UNK_TOKEN]
    }

    pub fn vec2txt(&self, vec: &[u32]) -> String {
        vec.iter()
            .map(|&idx| self.token_at(idx).unwrap_or(UNK_TOKEN))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl TextVectorizer for Dictionary {
    fn txt2vec(&self, text: &str) -> Result<TokenIds, AgentError> {
        let unk = self.unk_idx();
        Ok(tokenize(text)
            .into_iter()
            .map(|token| self.index_of(token).unwrap_or(unk))
            .collect())
    }

    fn start_idx(&self) -> Option<u32> {
        self.index_of(START_TOKEN)
    }

    fn end_idx(&self) -> Option<u32> {
        self.index_of(END_TOKEN)
    }
}

fn escape(token: &str) -> String {
    token.replace('\n', "\\n").replace('\t', "\\t")
}

fn unescape(token: &str) -> String {
    token.replace("\\n", "\n").replace("\\t", "\t")
}
