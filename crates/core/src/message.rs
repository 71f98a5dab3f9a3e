//! Message and History domain types.
//!
//! A session's history is the only mutable state in a chat: the user asks,
//! the assistant answers, both are appended in order and never touched again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The HR staff member asking
    User,
    /// The model's answer
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only, chronologically ordered message buffer for one session.
///
/// Older entries are never evicted; only the read view is bounded via
/// [`History::recent_window`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user question unless it repeats a trailing user entry verbatim.
    ///
    /// Returns `false` when the question was swallowed as a resubmission.
    pub fn append_question(&mut self, question: &str) -> bool {
        if self.is_resubmission(question) {
            return false;
        }
        self.append(Message::user(question));
        true
    }

    /// Whether `question` equals the content of a trailing user entry.
    pub fn is_resubmission(&self, question: &str) -> bool {
        self.messages
            .last()
            .is_some_and(|last| last.role == Role::User && last.content == question)
    }

    /// The last `min(n, len)` entries in original order.
    pub fn recent_window(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(n: usize) -> History {
        let mut history = History::new();
        for i in 0..n {
            if i % 2 == 0 {
                history.append(Message::user(format!("q{i}")));
            } else {
                history.append(Message::assistant(format!("a{i}")));
            }
        }
        history
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn append_grows_by_one_and_keeps_order() {
        let mut history = history_of(3);
        let before: Vec<Message> = history.messages().to_vec();

        history.append(Message::assistant("new"));

        assert_eq!(history.len(), 4);
        assert_eq!(&history.messages()[..3], before.as_slice());
        assert_eq!(history.last().unwrap().content, "new");
    }

    #[test]
    fn recent_window_is_contiguous_suffix() {
        let history = history_of(7);
        let window = history.recent_window(4);
        assert_eq!(window.len(), 4);
        assert_eq!(window, &history.messages()[3..]);
        assert_eq!(window[0].content, "a3");
        assert_eq!(window[3].content, "q6");
    }

    #[test]
    fn recent_window_shorter_buffer_returns_everything() {
        let history = history_of(2);
        assert_eq!(history.recent_window(6).len(), 2);
        assert!(History::new().recent_window(4).is_empty());
        assert!(history.recent_window(0).is_empty());
    }

    #[test]
    fn recent_window_does_not_mutate() {
        let history = history_of(5);
        let _ = history.recent_window(2);
        let _ = history.recent_window(100);
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn identical_question_is_debounced() {
        let mut history = History::new();
        assert!(history.append_question("email của Nguyen Van A?"));
        assert!(!history.append_question("email của Nguyen Van A?"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn same_question_after_answer_is_accepted() {
        let mut history = History::new();
        assert!(history.append_question("hi"));
        history.append(Message::assistant("hello"));
        assert!(history.append_question("hi"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }
}
