//! Conversation session: submission lifecycle and turn reconciliation.
//!
//! A turn moves `Idle -> Validating -> AwaitingResponse -> Streaming -> Sealed`.
//! [`ChatSession::begin_turn`] covers validation and records the user turn
//! synchronously; [`PendingSubmission::send`] covers the rest. Every failure
//! after validation becomes an assistant turn with a fixed message, so the
//! user always sees a reply once a question reached the network.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::error::SubmitError;
use crate::request::{Attachment, QueryPayload};
use crate::state::{ChatMessage, Conversation};
use crate::stream::StreamConsumer;
use crate::transport::{AnswerBody, ByteStream, QnaTransport};

pub const TRANSPORT_ERROR_MESSAGE: &str =
    "Error: could not get an answer from the document service. Please try again.";
pub const EMPTY_BODY_MESSAGE: &str = "Warning: the document service returned no response.";
pub const STREAM_ERROR_NOTE: &str = "[Error: the connection dropped before the answer finished.]";
pub const PARSE_ERROR_MESSAGE: &str = "Error: could not read the document service's response.";

/// Why a turn ended without a full answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnFailure {
    Transport,
    EmptyBody,
    StreamRead,
    MalformedResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered(String),
    Failed(TurnFailure),
}

/// Notifications for front ends that redraw on change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    TurnUpdated,
    Finished(TurnOutcome),
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    answer: String,
}

#[derive(Debug, Default)]
struct SessionState {
    conversation: Conversation,
    in_flight: bool,
    progress: Vec<String>,
}

/// Shared handle to one conversation.
///
/// Clones share the same state. The lock is never held across an await.
#[derive(Clone, Default)]
pub struct ChatSession {
    state: Arc<Mutex<SessionState>>,
    notifier: Option<UnboundedSender<SessionEvent>>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.notifier = Some(tx);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(tx) = &self.notifier {
            let _ = tx.send(event);
        }
    }

    /// Snapshot of the conversation.
    pub fn conversation(&self) -> Conversation {
        self.lock().conversation.clone()
    }

    /// Borrow the conversation without cloning it.
    pub fn with_conversation<R>(&self, f: impl FnOnce(&Conversation) -> R) -> R {
        f(&self.lock().conversation)
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn progress(&self) -> Vec<String> {
        self.lock().progress.clone()
    }

    pub fn push_progress(&self, step: impl Into<String>) {
        let step = step.into();
        debug!(%step, "progress");
        self.lock().progress.push(step);
    }

    pub fn clear_progress(&self) {
        self.lock().progress.clear();
    }

    /// Validate a question and record it as a user turn.
    ///
    /// Empty queries and overlapping submissions are rejected without touching
    /// the conversation. A missing attachment is rejected *after* the user turn
    /// is recorded, and no assistant turn follows it.
    pub fn begin_turn(
        &self,
        query: &str,
        attachment: Option<Attachment>,
    ) -> Result<PendingSubmission, SubmitError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SubmitError::EmptyQuery);
        }

        {
            let mut state = self.lock();
            if state.in_flight {
                debug!("rejecting submission while another is in flight");
                return Err(SubmitError::InFlight);
            }
            state.conversation.append(ChatMessage::user(query));
            state.progress.clear();
            state.in_flight = true;
        }
        let guard = InFlightGuard {
            session: self.clone(),
        };
        self.notify(SessionEvent::TurnUpdated);

        let payload = QueryPayload::build(query, attachment).inspect_err(|_| {
            warn!("question submitted without a document attached");
        })?;
        Ok(PendingSubmission { payload, guard })
    }

    /// Validate, send, and stream one turn.
    pub async fn submit<T>(
        &self,
        query: &str,
        attachment: Option<Attachment>,
        transport: &T,
    ) -> Result<TurnOutcome, SubmitError>
    where
        T: QnaTransport + ?Sized,
    {
        let pending = self.begin_turn(query, attachment)?;
        Ok(pending.send(transport).await)
    }

    /// Set the assistant turn to the latest full text.
    fn reconcile(&self, full_text: &str) {
        self.lock().conversation.update_last(full_text);
        self.notify(SessionEvent::TurnUpdated);
    }

    fn fail(&self, failure: TurnFailure, message: &str) -> TurnOutcome {
        self.reconcile(message);
        self.push_progress(format!("Failed: {:?}", failure));
        TurnOutcome::Failed(failure)
    }

    async fn stream_answer(&self, stream: ByteStream) -> TurnOutcome {
        self.push_progress("Receiving answer");

        match StreamConsumer::new()
            .consume(stream, |full| self.reconcile(full))
            .await
        {
            Ok(text) if text.is_empty() => self.fail(TurnFailure::EmptyBody, EMPTY_BODY_MESSAGE),
            Ok(text) => {
                self.push_progress("Answer complete");
                TurnOutcome::Answered(text)
            }
            Err(err) => {
                warn!(partial_chars = err.partial.chars().count(), "answer stream broke: {}", err.source);
                let content = if err.partial.is_empty() {
                    STREAM_ERROR_NOTE.to_string()
                } else {
                    format!("{}\n\n{}", err.partial, STREAM_ERROR_NOTE)
                };
                self.reconcile(&content);
                self.push_progress("Failed: StreamRead");
                TurnOutcome::Failed(TurnFailure::StreamRead)
            }
        }
    }

    fn apply_json(&self, body: &[u8]) -> TurnOutcome {
        match serde_json::from_slice::<JsonAnswer>(body) {
            Ok(JsonAnswer { answer }) if answer.is_empty() => {
                self.fail(TurnFailure::EmptyBody, EMPTY_BODY_MESSAGE)
            }
            Ok(JsonAnswer { answer }) => {
                self.reconcile(&answer);
                self.push_progress("Answer complete");
                TurnOutcome::Answered(answer)
            }
            Err(e) => {
                warn!("could not parse JSON answer: {}", e);
                self.fail(TurnFailure::MalformedResponse, PARSE_ERROR_MESSAGE)
            }
        }
    }
}

/// Resets the in-flight flag and seals the assistant turn when dropped,
/// including when the owning future is cancelled.
struct InFlightGuard {
    session: ChatSession,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        state.in_flight = false;
        state.conversation.seal();
    }
}

/// An accepted question waiting to be sent.
pub struct PendingSubmission {
    payload: QueryPayload,
    guard: InFlightGuard,
}

impl PendingSubmission {
    pub fn query(&self) -> &str {
        &self.payload.query
    }

    pub fn attachment(&self) -> &Attachment {
        &self.payload.attachment
    }

    /// Send the question and drive the answer to a sealed assistant turn.
    pub async fn send<T>(self, transport: &T) -> TurnOutcome
    where
        T: QnaTransport + ?Sized,
    {
        let session = self.guard.session.clone();
        session.push_progress(format!(
            "Sending question with {}",
            self.payload.attachment.file_name
        ));

        let outcome = match transport.send_query(self.payload).await {
            Err(e) => {
                error!("query request failed: {}", e);
                session.fail(TurnFailure::Transport, TRANSPORT_ERROR_MESSAGE)
            }
            Ok(AnswerBody::Empty) => session.fail(TurnFailure::EmptyBody, EMPTY_BODY_MESSAGE),
            Ok(AnswerBody::Json(body)) => session.apply_json(&body),
            Ok(AnswerBody::Stream(stream)) => session.stream_answer(stream).await,
        };

        drop(self.guard);
        info!(outcome = ?outcome, "turn finished");
        session.notify(SessionEvent::Finished(outcome.clone()));
        outcome
    }
}
