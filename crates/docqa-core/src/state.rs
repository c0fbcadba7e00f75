//! UI-agnostic conversation state
//!
//! This module contains the message store shared by every front end (TUI,
//! one-shot `ask` command). It is pure data plus the mutation rules; the
//! conversation is append-only.

use serde::{Deserialize, Serialize};

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered sequence of turns.
///
/// At most one assistant turn is open (still receiving content) at a time.
/// The open turn is always the last one; [`Conversation::seal`] closes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
    #[serde(skip)]
    open: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn to the end of the sequence.
    pub fn append(&mut self, turn: ChatMessage) {
        self.open = false;
        self.turns.push(turn);
    }

    /// Set the full content of the current assistant turn.
    ///
    /// If the last turn is an assistant turn its content is replaced,
    /// otherwise a new assistant turn is appended. Either way the assistant
    /// turn is left open until [`Conversation::seal`].
    pub fn update_last(&mut self, content: &str) {
        match self.turns.last_mut() {
            Some(last) if last.role == ChatRole::Assistant => {
                if last.content != content {
                    last.content.clear();
                    last.content.push_str(content);
                }
            }
            _ => self.turns.push(ChatMessage::assistant(content)),
        }
        self.open = true;
    }

    /// Close the open assistant turn. No-op if nothing is streaming.
    pub fn seal(&mut self) {
        self.open = false;
    }

    pub fn is_streaming(&self) -> bool {
        self.open
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn count_role(&self, role: ChatRole) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }
}
