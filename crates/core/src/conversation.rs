//! Conversation model for the assistant / executor group chat.
//!
//! The chat is an append-only log shared by two participants that speak in a
//! fixed round-robin order. This module holds the turn policy and the
//! termination rules; the shell drives it with real model and executor calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::{python_extractor, CodeExtractor};

/// Token the assistant emits when the task is complete.
pub const TERMINATE_TOKEN: &str = "TERMINATE";

/// Default cap on the number of messages in one group chat.
pub const DEFAULT_MAX_ROUND: usize = 6;

// ============================================================================
// Messages
// ============================================================================

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Executor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Executor => "executor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn executor(content: impl Into<String>) -> Self {
        Self::new(Role::Executor, content)
    }
}

// ============================================================================
// Group chat
// ============================================================================

/// Why a group chat stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The message log reached `max_round` entries.
    MaxRounds,
    /// The executor had no code to run in the latest assistant reply.
    NoCode,
    /// The assistant declared the task complete.
    Terminated,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::MaxRounds => write!(f, "maximum rounds reached"),
            TerminationReason::NoCode => write!(f, "no further code to execute"),
            TerminationReason::Terminated => write!(f, "assistant finished the task"),
        }
    }
}

/// Round-robin chat between the assistant and the executor.
///
/// The seeding message counts as the first round; the assistant always speaks
/// after a user or executor message and the executor after the assistant.
#[derive(Debug, Clone, Serialize)]
pub struct GroupChat {
    max_round: usize,
    messages: Vec<ChatMessage>,
    termination: Option<TerminationReason>,
}

impl GroupChat {
    pub fn new(max_round: usize) -> Self {
        Self {
            max_round,
            messages: Vec::new(),
            termination: None,
        }
    }

    pub fn max_round(&self) -> usize {
        self.max_round
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Append a message and re-evaluate the termination rules.
    pub fn push(&mut self, message: ChatMessage) {
        if self.termination.is_some() {
            return;
        }

        let declared_done =
            message.role == Role::Assistant && message.content.contains(TERMINATE_TOKEN);
        self.messages.push(message);

        if declared_done {
            self.termination = Some(TerminationReason::Terminated);
        } else if self.messages.len() >= self.max_round {
            self.termination = Some(TerminationReason::MaxRounds);
        }
    }

    /// Stop the chat for a reason observed by the driver.
    pub fn terminate(&mut self, reason: TerminationReason) {
        self.termination.get_or_insert(reason);
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    /// Participant whose turn it is, or `None` once the chat is finished.
    pub fn next_speaker(&self) -> Option<Role> {
        if self.is_finished() {
            return None;
        }

        match self.messages.last().map(|m| m.role) {
            Some(Role::Assistant) => Some(Role::Executor),
            _ => Some(Role::Assistant),
        }
    }

    /// Content of the most recent assistant message.
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Assistant message contents in conversation order.
    pub fn assistant_replies(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect()
    }
}

/// Pick the code to run from a list of assistant replies.
///
/// Replies are scanned newest first; the first one yielding non-empty code
/// wins.
pub fn select_code<S: AsRef<str>>(replies: &[S]) -> Option<String> {
    select_code_with(python_extractor(), replies)
}

/// [`select_code`] with an explicit extractor.
pub fn select_code_with<S: AsRef<str>>(extractor: &CodeExtractor, replies: &[S]) -> Option<String> {
    replies
        .iter()
        .rev()
        .filter_map(|reply| extractor.extract(reply.as_ref()))
        .find(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fenced(code: &str) -> String {
        format!("```python\n{code}\n```")
    }

    // ============================================================================
    // Turn order
    // ============================================================================

    #[test]
    fn test_assistant_speaks_first() {
        let mut chat = GroupChat::new(DEFAULT_MAX_ROUND);
        assert_eq!(chat.next_speaker(), Some(Role::Assistant));

        chat.push(ChatMessage::user("List active quotes"));
        assert_eq!(chat.next_speaker(), Some(Role::Assistant));
    }

    #[test]
    fn test_round_robin_alternates() {
        let mut chat = GroupChat::new(10);
        chat.push(ChatMessage::user("task"));
        chat.push(ChatMessage::assistant(fenced("print(1)")));
        assert_eq!(chat.next_speaker(), Some(Role::Executor));

        chat.push(ChatMessage::executor("exitcode: 0 (execution succeeded)\nCode output: 1"));
        assert_eq!(chat.next_speaker(), Some(Role::Assistant));
    }

    // ============================================================================
    // Termination
    // ============================================================================

    #[test]
    fn test_max_rounds() {
        let mut chat = GroupChat::new(3);
        chat.push(ChatMessage::user("task"));
        chat.push(ChatMessage::assistant(fenced("print(1)")));
        assert!(!chat.is_finished());

        chat.push(ChatMessage::executor("exitcode: 0 (execution succeeded)\nCode output: 1"));
        assert_eq!(chat.termination(), Some(TerminationReason::MaxRounds));
        assert_eq!(chat.next_speaker(), None);
    }

    #[test]
    fn test_terminate_token_ends_chat() {
        let mut chat = GroupChat::new(10);
        chat.push(ChatMessage::user("task"));
        chat.push(ChatMessage::assistant("All done. TERMINATE"));
        assert_eq!(chat.termination(), Some(TerminationReason::Terminated));
    }

    #[test]
    fn test_terminate_token_from_user_is_ignored() {
        let mut chat = GroupChat::new(10);
        chat.push(ChatMessage::user("say TERMINATE when done"));
        assert!(!chat.is_finished());
    }

    #[test]
    fn test_driver_termination_is_sticky() {
        let mut chat = GroupChat::new(10);
        chat.push(ChatMessage::user("task"));
        chat.terminate(TerminationReason::NoCode);
        chat.terminate(TerminationReason::MaxRounds);
        assert_eq!(chat.termination(), Some(TerminationReason::NoCode));
    }

    #[test]
    fn test_push_after_finish_is_ignored() {
        let mut chat = GroupChat::new(1);
        chat.push(ChatMessage::user("task"));
        chat.push(ChatMessage::assistant("late"));
        assert_eq!(chat.messages().len(), 1);
    }

    // ============================================================================
    // Replies and code selection
    // ============================================================================

    #[test]
    fn test_assistant_replies_in_order() {
        let mut chat = GroupChat::new(10);
        chat.push(ChatMessage::user("task"));
        chat.push(ChatMessage::assistant("first"));
        chat.push(ChatMessage::executor("out"));
        chat.push(ChatMessage::assistant("second"));

        assert_eq!(chat.assistant_replies(), vec!["first", "second"]);
        assert_eq!(chat.last_assistant_reply(), Some("second"));
    }

    #[test]
    fn test_select_code_prefers_latest() {
        let replies = vec![fenced("old()"), "no code here".to_string(), fenced("new()")];
        assert_eq!(select_code(&replies), Some("new()".to_string()));
    }

    #[test]
    fn test_select_code_falls_back_to_earlier_reply() {
        let replies = vec![fenced("only()"), "Looks good. TERMINATE".to_string()];
        assert_eq!(select_code(&replies), Some("only()".to_string()));
    }

    #[test]
    fn test_select_code_skips_empty_blocks() {
        let replies = vec![fenced("real()"), "```\n\n```".to_string()];
        assert_eq!(select_code(&replies), Some("real()".to_string()));
    }

    #[test]
    fn test_select_code_none() {
        let replies: Vec<&str> = vec!["nothing", "still nothing"];
        assert_eq!(select_code(&replies), None);
    }

    #[test]
    fn test_select_code_with_other_language() {
        let extractor = CodeExtractor::new("sh").unwrap();
        let replies = vec!["```sh\necho ok\n```", "done"];
        assert_eq!(select_code_with(&extractor, &replies), Some("echo ok".to_string()));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Executor).unwrap();
        assert_eq!(json, "\"executor\"");
    }
}
