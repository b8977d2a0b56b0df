use serde::{Deserialize, Serialize};

pub type TokenIds = Vec<u32>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_candidates: Option<Vec<String>>,
    /// Candidate knowledge lines, each terminated by `\n`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<String>,
    /// The knowledge line the reference reply was grounded on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_sentence: Option<String>,
    #[serde(default = "default_episode_done")]
    pub episode_done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_vec: Option<TokenIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_vec: Option<TokenIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_candidates_vecs: Option<Vec<TokenIds>>,
    /// One vector per selected knowledge line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_vecs: Option<Vec<TokenIds>>,
}

// A turn without an explicit flag closes its episode.
fn default_episode_done() -> bool {
    true
}

impl Observation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            episode_done: true,
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_eval_labels(mut self, labels: Vec<String>) -> Self {
        self.eval_labels = Some(labels);
        self
    }

    pub fn with_label_candidates(mut self, candidates: Vec<String>) -> Self {
        self.label_candidates = Some(candidates);
        self
    }

    pub fn with_knowledge(mut self, knowledge: impl Into<String>) -> Self {
        self.knowledge = Some(knowledge.into());
        self
    }

    pub fn with_checked_sentence(mut self, sentence: impl Into<String>) -> Self {
        self.checked_sentence = Some(sentence.into());
        self
    }

    pub fn with_episode_done(mut self, done: bool) -> Self {
        self.episode_done = done;
        self
    }

    /// Whether the turn carries evaluation labels (validation / test time).
    pub fn has_eval_labels(&self) -> bool {
        self.eval_labels.is_some()
    }

    /// Gold knowledge sentence, treating an empty string as absent.
    pub fn checked_sentence(&self) -> Option<&str> {
        self.checked_sentence.as_deref().filter(|s| !s.is_empty())
    }

    /// Candidate knowledge lines. The segment after the final newline is
    /// always dropped, so input without a trailing newline loses its last
    /// line.
    pub fn knowledge_lines(&self) -> Vec<&str> {
        let Some(knowledge) = self.knowledge.as_deref() else {
            return Vec::new();
        };
        let mut lines: Vec<&str> = knowledge.split('\n').collect();
        lines.pop();
        lines
    }

    /// Training labels if present, otherwise evaluation labels.
    pub fn any_labels(&self) -> Option<&[String]> {
        self.labels
            .as_deref()
            .or(self.eval_labels.as_deref())
            .filter(|labels| !labels.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knowledge_lines_drop_trailing_segment() {
        let obs = Observation::new("hi").with_knowledge("fact1\nfact2\nfact3\n");
        assert_eq!(obs.knowledge_lines(), vec!["fact1", "fact2", "fact3"]);
    }

    #[test]
    fn knowledge_without_trailing_newline_loses_last_line() {
        let obs = Observation::new("hi").with_knowledge("fact1\nfact2");
        assert_eq!(obs.knowledge_lines(), vec!["fact1"]);

        let single = Observation::new("hi").with_knowledge("only");
        assert!(single.knowledge_lines().is_empty());
    }

    #[test]
    fn empty_or_missing_knowledge_has_no_lines() {
        assert!(Observation::new("hi").knowledge_lines().is_empty());
        assert!(Observation::new("hi").with_knowledge("").knowledge_lines().is_empty());
    }

    #[test]
    fn empty_checked_sentence_counts_as_absent() {
        let obs = Observation::new("hi").with_checked_sentence("");
        assert_eq!(obs.checked_sentence(), None);
    }

    #[test]
    fn json_without_episode_done_closes_episode() {
        let obs: Observation =
            serde_json::from_str(r#"{"text": "hello", "eval_labels": ["hi"]}"#).unwrap();
        assert!(obs.episode_done);
        assert!(obs.has_eval_labels());
        assert!(obs.memory_vecs.is_none());
    }
}
