//! Read loop turning a chunked response body into growing answer text.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, trace};

use crate::decode::Utf8Decoder;
use crate::error::{ConsumeError, TransportError};

/// Drives one response body to completion.
///
/// Every time the accumulated text grows, the callback receives the **full**
/// text so far rather than the delta, so consumers can overwrite instead of
/// merge.
#[derive(Debug, Default)]
pub struct StreamConsumer {
    decoder: Utf8Decoder,
    accumulated: String,
    chunks: usize,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read until end of stream or the first read error.
    ///
    /// The stream is owned here and dropped on every exit path, which releases
    /// the underlying connection.
    pub async fn consume<S, F>(mut self, stream: S, mut on_update: F) -> Result<String, ConsumeError>
    where
        S: Stream<Item = Result<Bytes, TransportError>>,
        F: FnMut(&str),
    {
        futures_util::pin_mut!(stream);

        while let Some(next) = stream.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(source) => {
                    debug!(chunks = self.chunks, "stream read failed: {}", source);
                    return Err(ConsumeError {
                        partial: self.accumulated,
                        source,
                    });
                }
            };

            self.chunks += 1;
            let text = self.decoder.decode(&chunk);
            trace!(bytes = chunk.len(), decoded = text.len(), "chunk received");
            self.push(&text, &mut on_update);
        }

        let tail = std::mem::take(&mut self.decoder).finish();
        self.push(&tail, &mut on_update);

        debug!(
            chunks = self.chunks,
            chars = self.accumulated.chars().count(),
            "stream finished"
        );
        Ok(self.accumulated)
    }

    fn push<F: FnMut(&str)>(&mut self, text: &str, on_update: &mut F) {
        if text.is_empty() {
            return;
        }
        self.accumulated.push_str(text);
        on_update(&self.accumulated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, TransportError>> {
        let items: Vec<Result<Bytes, TransportError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(*p))).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_emits_full_accumulator_each_time() {
        let mut seen = Vec::new();
        let text = StreamConsumer::new()
            .consume(chunks(&[b"H", b"el", b"lo"]), |full| seen.push(full.to_string()))
            .await
            .expect("stream completes");

        assert_eq!(text, "Hello");
        assert_eq!(seen, vec!["H", "Hel", "Hello"]);
    }

    #[tokio::test]
    async fn test_multibyte_split_across_chunks() {
        // "ü" = 0xC3 0xBC
        let mut seen = Vec::new();
        let text = StreamConsumer::new()
            .consume(chunks(&[b"gr\xC3", b"\xBCn"]), |full| seen.push(full.to_string()))
            .await
            .expect("stream completes");

        assert_eq!(text, "grün");
        assert!(seen.iter().all(|s| !s.contains('\u{FFFD}')));
        assert_eq!(seen, vec!["gr", "grün"]);
    }

    #[tokio::test]
    async fn test_empty_stream_emits_nothing() {
        let mut calls = 0;
        let text = StreamConsumer::new()
            .consume(chunks(&[]), |_| calls += 1)
            .await
            .expect("stream completes");

        assert!(text.is_empty());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_read_error_keeps_partial() {
        let parts: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"partial ")),
            Ok(Bytes::from_static(b"answer")),
            Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))),
            Ok(Bytes::from_static(b"never read")),
        ];

        let err = StreamConsumer::new()
            .consume(stream::iter(parts), |_| {})
            .await
            .expect_err("stream fails");

        assert_eq!(err.partial, "partial answer");
        assert!(matches!(err.source, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn test_truncated_tail_flushed_at_end() {
        let mut last = String::new();
        let text = StreamConsumer::new()
            .consume(chunks(&[b"ok\xE2\x82"]), |full| last = full.to_string())
            .await
            .expect("stream completes");

        assert_eq!(text, "ok\u{FFFD}");
        assert_eq!(last, text);
    }
}
