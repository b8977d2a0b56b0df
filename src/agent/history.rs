//! Dialogue history reconstruction.
//!
//! Each turn the previous reply and the new utterance are appended to the
//! running history, and the observation's `text` is replaced by the joined
//! history. The history is cleared once an episode ends.

use std::collections::VecDeque;

use super::observation::Observation;

pub const P1_TOKEN: &str = "__p1__";
pub const P2_TOKEN: &str = "__p2__";

/// How history lines are decorated and joined.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryOptions {
    pub add_person_tokens: bool,
    pub add_p1_after_newln: bool,
    pub join_history_tok: String,
    /// Maximum number of lines kept; `None` keeps the whole episode.
    pub history_size: Option<usize>,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            add_person_tokens: false,
            add_p1_after_newln: false,
            join_history_tok: "\n".to_string(),
            history_size: None,
        }
    }
}

pub trait HistoryBuilder: Send {
    /// Folds `reply` and the observation's text into the history and
    /// returns the observation with `text` set to the full history.
    fn update(
        &mut self,
        observation: Observation,
        reply: Option<&str>,
        options: &HistoryOptions,
    ) -> Observation;

    fn reset(&mut self);
}

#[derive(Debug, Default, Clone)]
pub struct DialogHistory {
    lines: VecDeque<String>,
}

impl DialogHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl HistoryBuilder for DialogHistory {
    fn update(
        &mut self,
        mut observation: Observation,
        reply: Option<&str>,
        options: &HistoryOptions,
    ) -> Observation {
        if let Some(reply) = reply {
            let line = if options.add_person_tokens {
                format!("{} {}", P2_TOKEN, reply)
            } else {
                reply.to_string()
            };
            self.lines.push_back(line);
        }

        if let Some(text) = observation.text.as_deref() {
            let line = if options.add_person_tokens {
                add_person_token(text, P1_TOKEN, options.add_p1_after_newln)
            } else {
                text.to_string()
            };
            self.lines.push_back(line);
        }

        if let Some(limit) = options.history_size {
            while self.lines.len() > limit {
                self.lines.pop_front();
            }
        }

        if observation.text.is_some() || !self.lines.is_empty() {
            let joined = self
                .lines
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(&options.join_history_tok);
            observation.text = Some(joined);
        }

        if observation.episode_done {
            self.reset();
        }
        observation
    }

    fn reset(&mut self) {
        self.lines.clear();
    }
}

/// Prefixes `text` with `token`, or only its last line when
/// `after_newline` is set (earlier lines are usually task context).
fn add_person_token(text: &str, token: &str, after_newline: bool) -> String {
    if after_newline {
        if let Some((head, last)) = text.rsplit_once('\n') {
            return format!("{}\n{} {}", head, token, last);
        }
    }
    format!("{} {}", token, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(join: &str) -> HistoryOptions {
        HistoryOptions {
            join_history_tok: join.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn history_accumulates_reply_and_text_within_episode() {
        let mut history = DialogHistory::new();
        let first = history.update(
            Observation::new("hi there").with_episode_done(false),
            None,
            &opts(" "),
        );
        assert_eq!(first.text.as_deref(), Some("hi there"));

        let second = history.update(
            Observation::new("how are you").with_episode_done(false),
            Some("hello"),
            &opts(" "),
        );
        assert_eq!(second.text.as_deref(), Some("hi there hello how are you"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn episode_end_clears_history_after_use() {
        let mut history = DialogHistory::new();
        history.update(Observation::new("a").with_episode_done(false), None, &opts("\n"));
        let last = history.update(Observation::new("b"), Some("r"), &opts("\n"));
        assert_eq!(last.text.as_deref(), Some("a\nr\nb"));
        assert!(history.is_empty());
    }

    #[test]
    fn person_tokens_mark_speakers() {
        let mut history = DialogHistory::new();
        let options = HistoryOptions {
            add_person_tokens: true,
            join_history_tok: " ".to_string(),
            ..Default::default()
        };
        history.update(Observation::new("hi").with_episode_done(false), None, &options);
        let obs = history.update(Observation::new("bye"), Some("hello"), &options);
        assert_eq!(obs.text.as_deref(), Some("__p1__ hi __p2__ hello __p1__ bye"));
    }

    #[test]
    fn p1_after_newline_marks_only_last_line() {
        assert_eq!(
            add_person_token("your persona: x\nhello", P1_TOKEN, true),
            "your persona: x\n__p1__ hello"
        );
        assert_eq!(add_person_token("hello", P1_TOKEN, true), "__p1__ hello");
        assert_eq!(
            add_person_token("a\nb", P1_TOKEN, false),
            "__p1__ a\nb"
        );
    }

    #[test]
    fn history_size_keeps_most_recent_lines() {
        let mut history = DialogHistory::new();
        let options = HistoryOptions {
            history_size: Some(2),
            join_history_tok: "|".to_string(),
            ..Default::default()
        };
        history.update(Observation::new("one").with_episode_done(false), None, &options);
        history.update(Observation::new("two").with_episode_done(false), None, &options);
        let obs = history.update(Observation::new("three").with_episode_done(false), None, &options);
        assert_eq!(obs.text.as_deref(), Some("two|three"));
        assert_eq!(history.lines().collect::<Vec<_>>(), vec!["two", "three"]);
    }
}
