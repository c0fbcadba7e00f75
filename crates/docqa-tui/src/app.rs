use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::{
    Attachment, ChatRole, ChatSession, HttpTransport, SessionEvent, SubmitError, TurnFailure,
    TurnOutcome,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which single-line field receives typing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Query,
    Attachment,
}

/// Single-line editable text with a character-based cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TextInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.char_count();
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: Field,

    pub query: TextInput,
    pub attachment_path: TextInput,
    pub attachment: Option<Attachment>,

    /// One-line feedback shown in the footer
    pub status: Option<String>,

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,  // inner width of the chat area, set during render
    pub follow_tail: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub session: ChatSession,
    pub transport: Arc<HttpTransport>,
    pub submit_task: Option<JoinHandle<TurnOutcome>>,
}

impl App {
    pub fn new(session: ChatSession, transport: HttpTransport) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: Field::Query,

            query: TextInput::default(),
            attachment_path: TextInput::default(),
            attachment: None,

            status: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,

            animation_frame: 0,

            session,
            transport: Arc::new(transport),
            submit_task: None,
        }
    }

    pub fn active_input(&mut self) -> &mut TextInput {
        match self.focus {
            Field::Query => &mut self.query,
            Field::Attachment => &mut self.attachment_path,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Query => Field::Attachment,
            Field::Attachment => Field::Query,
        };
        self.input_mode = InputMode::Editing;
    }

    /// Record the typed question and start streaming its answer.
    pub fn submit_query(&mut self) {
        match self.session.begin_turn(&self.query.text, self.attachment.clone()) {
            Ok(pending) => {
                self.query.clear();
                self.status = None;
                self.follow_tail = true;

                let transport = Arc::clone(&self.transport);
                self.submit_task = Some(tokio::spawn(async move {
                    pending.send(transport.as_ref()).await
                }));
            }
            Err(SubmitError::EmptyQuery) => {}
            Err(SubmitError::InFlight) => {
                self.status = Some("Still answering the previous question".to_string());
            }
            Err(SubmitError::MissingAttachment) => {
                // The question was recorded; only the send was skipped.
                self.query.clear();
                self.status = Some(
                    "No PDF attached - press Tab, type a file path, then Enter".to_string(),
                );
            }
        }
        self.scroll_chat_to_bottom();
    }

    pub async fn load_attachment_from_input(&mut self) {
        let path = PathBuf::from(self.attachment_path.text.trim());
        if path.as_os_str().is_empty() {
            return;
        }
        self.load_attachment(&path).await;
        if self.attachment.is_some() {
            self.focus = Field::Query;
        }
    }

    pub async fn load_attachment(&mut self, path: &Path) {
        match Attachment::from_path(path).await {
            Ok(attachment) => {
                info!(file = %attachment.file_name, bytes = attachment.len(), "attachment loaded");
                self.status = Some(format!(
                    "Attached {} ({} KB)",
                    attachment.file_name,
                    attachment.len().div_ceil(1024)
                ));
                self.attachment_path.set(&path.display().to_string());
                self.attachment = Some(attachment);
            }
            Err(e) => {
                warn!(path = %path.display(), "could not read attachment: {}", e);
                self.status = Some(format!("Could not read {}: {}", path.display(), e));
            }
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TurnUpdated => {}
            SessionEvent::Finished(outcome) => {
                self.submit_task = None;
                self.status = match outcome {
                    TurnOutcome::Answered(_) => None,
                    TurnOutcome::Failed(TurnFailure::Transport) => {
                        Some("Request failed - is the service running?".to_string())
                    }
                    TurnOutcome::Failed(TurnFailure::StreamRead) => {
                        Some("Answer cut off by a connection error".to_string())
                    }
                    TurnOutcome::Failed(TurnFailure::EmptyBody) => {
                        Some("The service sent an empty answer".to_string())
                    }
                    TurnOutcome::Failed(TurnFailure::MalformedResponse) => {
                        Some("The service sent an unreadable answer".to_string())
                    }
                };
            }
        }
        self.scroll_chat_to_bottom();
    }

    /// True while waiting for the first byte of an answer
    pub fn is_thinking(&self) -> bool {
        self.session.is_in_flight()
            && self
                .session
                .with_conversation(|c| c.last().map(|t| t.role == ChatRole::User).unwrap_or(false))
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
        let max = self.chat_total_lines().saturating_sub(self.visible_height());
        if self.chat_scroll >= max {
            self.chat_scroll = max;
            self.follow_tail = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_tail = false;
        self.chat_scroll = 0;
    }

    /// Keep the newest text visible while following the tail
    pub fn scroll_chat_to_bottom(&mut self) {
        if !self.follow_tail {
            return;
        }
        let total_lines = self.chat_total_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn chat_total_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = self.session.with_conversation(|conv| {
            let mut lines: u16 = 0;
            for msg in conv.turns() {
                lines = lines.saturating_add(1); // Role line ("You:" or "AI:")
                for line in msg.content.lines() {
                    // Use character count, not byte length, for proper UTF-8 handling
                    let char_count = line.chars().count();
                    lines = lines.saturating_add((char_count / wrap_width + 1) as u16);
                }
                lines = lines.saturating_add(1); // Blank line after message
            }
            lines
        });

        if self.is_thinking() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }
        total_lines
    }

    /// Stop any in-flight answer; its guard resets the session on drop.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.submit_task.take() {
            task.abort();
        }
    }
}
