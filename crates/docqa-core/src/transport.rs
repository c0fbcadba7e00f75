//! HTTP boundary to the document QnA service.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::request::{upload_form, Attachment, QueryPayload};

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// What came back for a query, before any decoding.
pub enum AnswerBody {
    /// Chunked text whose concatenation is the answer
    Stream(ByteStream),
    /// A complete `{"answer": ...}` document
    Json(Bytes),
    /// Nothing readable
    Empty,
}

impl std::fmt::Debug for AnswerBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerBody::Stream(_) => f.write_str("AnswerBody::Stream(..)"),
            AnswerBody::Json(bytes) => write!(f, "AnswerBody::Json({} bytes)", bytes.len()),
            AnswerBody::Empty => f.write_str("AnswerBody::Empty"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

/// Sends one question and hands back the response body.
#[async_trait]
pub trait QnaTransport: Send + Sync {
    async fn send_query(&self, payload: QueryPayload) -> Result<AnswerBody, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_connect_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.base_url, path)
    }

    /// Upload a document on its own. Not part of a chat turn.
    pub async fn upload(&self, attachment: &Attachment) -> Result<serde_json::Value, TransportError> {
        let url = self.endpoint("upload");
        info!(%url, file = %attachment.file_name, bytes = attachment.len(), "uploading document");

        let response = self
            .client
            .post(&url)
            .multipart(upload_form(attachment)?)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl QnaTransport for HttpTransport {
    async fn send_query(&self, payload: QueryPayload) -> Result<AnswerBody, TransportError> {
        let url = self.endpoint("query");
        info!(
            %url,
            file = %payload.attachment.file_name,
            bytes = payload.attachment.len(),
            "sending query"
        );

        let response = self
            .client
            .post(&url)
            .multipart(payload.into_form()?)
            .send()
            .await?;
        let response = check_status(response).await?;

        if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            debug!("response has no body");
            return Ok(AnswerBody::Empty);
        }

        if is_json(&response) {
            debug!("response is a complete JSON document");
            return Ok(AnswerBody::Json(response.bytes().await?));
        }

        debug!(status = %response.status(), "streaming response body");
        Ok(AnswerBody::Stream(
            response.bytes_stream().map_err(TransportError::from).boxed(),
        ))
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ServiceError>(&text)
        .map(|e| e.error)
        .ok()
        .or_else(|| (!text.is_empty()).then_some(text));
    warn!(status = status.as_u16(), detail = ?detail, "service returned an error status");

    Err(TransportError::Status {
        status: status.as_u16(),
        detail,
    })
}
