use thiserror::Error;

/// Reasons a submission is rejected before it reaches the network.
///
/// None of these produce an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("a query is already in flight")]
    InFlight,

    #[error("no document attached; the service requires a PDF with every question")]
    MissingAttachment,
}

/// Failures talking to the QnA service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned non-success status: {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A read failure after the stream started.
///
/// `partial` is everything decoded before the failure.
#[derive(Debug, Error)]
#[error("stream read failed after {} bytes of text: {source}", .partial.len())]
pub struct ConsumeError {
    pub partial: String,
    #[source]
    pub source: TransportError,
}
