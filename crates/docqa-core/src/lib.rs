pub mod config;
pub mod decode;
pub mod error;
pub mod request;
pub mod session;
pub mod state;
pub mod stream;
pub mod transport;

// Re-export main types for convenience
pub use config::Config;
pub use decode::Utf8Decoder;
pub use error::{ConsumeError, SubmitError, TransportError};
pub use request::{Attachment, QueryPayload};
pub use session::{ChatSession, PendingSubmission, SessionEvent, TurnFailure, TurnOutcome};
pub use state::{ChatMessage, ChatRole, Conversation};
pub use stream::StreamConsumer;
pub use transport::{AnswerBody, HttpTransport, QnaTransport};
