//! Outbound multipart payloads for the QnA service.

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::error::{SubmitError, TransportError};

/// Multipart field carrying the question text
pub const QUERY_FIELD: &str = "query";
/// Multipart field carrying the document on `/query/`
pub const ATTACHMENT_FIELD: &str = "pdf";
/// Multipart field carrying the document on `/upload/`
pub const UPLOAD_FIELD: &str = "file";

const PDF_MIME: &str = "application/pdf";
const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// A document sent alongside a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn to_part(&self) -> Result<Part, TransportError> {
        let part = Part::bytes(self.bytes.to_vec())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)?;
        Ok(part)
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let is_pdf = Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        PDF_MIME
    } else {
        OCTET_STREAM_MIME
    }
}

/// Everything needed to send one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPayload {
    pub query: String,
    pub attachment: Attachment,
}

impl QueryPayload {
    /// Pair a question with its document. The service rejects questions
    /// without one, so a missing attachment stops the submission here.
    pub fn build(query: &str, attachment: Option<Attachment>) -> Result<Self, SubmitError> {
        let attachment = attachment.ok_or(SubmitError::MissingAttachment)?;
        Ok(Self {
            query: query.to_string(),
            attachment,
        })
    }

    pub fn into_form(self) -> Result<Form, TransportError> {
        let form = Form::new()
            .text(QUERY_FIELD, self.query)
            .part(ATTACHMENT_FIELD, self.attachment.to_part()?);
        Ok(form)
    }
}

/// Form for the standalone `/upload/` endpoint.
pub fn upload_form(attachment: &Attachment) -> Result<Form, TransportError> {
    Ok(Form::new().part(UPLOAD_FIELD, attachment.to_part()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_build_requires_attachment() {
        let err = QueryPayload::build("what is this?", None).unwrap_err();
        assert_eq!(err, SubmitError::MissingAttachment);
    }

    #[test]
    fn test_build_keeps_query_and_attachment() {
        let doc = Attachment::from_bytes("report.pdf", b"%PDF-1.4".to_vec());
        let payload = QueryPayload::build("summary?", Some(doc.clone())).unwrap();
        assert_eq!(payload.query, "summary?");
        assert_eq!(payload.attachment, doc);
    }

    #[test]
    fn test_mime_inference() {
        assert_eq!(Attachment::from_bytes("a.PDF", Vec::new()).mime, "application/pdf");
        assert_eq!(
            Attachment::from_bytes("notes.txt", Vec::new()).mime,
            "application/octet-stream"
        );
        assert_eq!(Attachment::from_bytes("noext", Vec::new()).mime, "application/octet-stream");
    }

    #[test]
    fn test_into_form_sets_boundary() {
        let doc = Attachment::from_bytes("report.pdf", b"%PDF".to_vec());
        let form = QueryPayload::build("q", Some(doc)).unwrap().into_form().unwrap();
        assert!(!form.boundary().is_empty());
    }

    #[tokio::test]
    async fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"%PDF-1.7 body").unwrap();

        let doc = Attachment::from_path(&path).await.unwrap();
        assert_eq!(doc.file_name, "paper.pdf");
        assert_eq!(doc.mime, "application/pdf");
        assert_eq!(doc.len(), 13);
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Attachment::from_path(dir.path().join("absent.pdf")).await;
        assert!(result.is_err());
    }
}
