use std::time::Duration;

use docqa_core::session::{EMPTY_BODY_MESSAGE, TRANSPORT_ERROR_MESSAGE};
use docqa_core::{
    AnswerBody, Attachment, ChatRole, ChatSession, HttpTransport, QnaTransport, QueryPayload,
    TransportError, TurnFailure, TurnOutcome,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

fn report() -> Attachment {
    Attachment::from_bytes("report.pdf", b"%PDF-1.4 fake document".to_vec())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read one full HTTP request so the client never sees a reset.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut tmp).await.expect("read request");
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());

    match content_length {
        Some(len) => {
            while buf.len() < header_end + len {
                let n = socket.read(&mut tmp).await.expect("read body");
                assert!(n > 0, "client closed mid-body");
                buf.extend_from_slice(&tmp[..n]);
            }
        }
        None => {
            while !buf.ends_with(b"0\r\n\r\n") {
                let n = socket.read(&mut tmp).await.expect("read chunked body");
                assert!(n > 0, "client closed mid-body");
                buf.extend_from_slice(&tmp[..n]);
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve exactly one request, writing `parts` with a short pause between
/// them. Returns the raw request text.
async fn serve_once(parts: Vec<Vec<u8>>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local test server");
    let addr = listener.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");
        let request = read_request(&mut socket).await;
        for part in parts {
            socket.write_all(&part).await.expect("write response");
            socket.flush().await.expect("flush response");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{}", addr), server)
}

fn chunked_response(chunks: &[&[u8]]) -> Vec<Vec<u8>> {
    let mut parts = vec![b"HTTP/1.1 200 OK\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Transfer-Encoding: chunked\r\n\
Connection: close\r\n\r\n"
        .to_vec()];
    for chunk in chunks {
        let mut part = format!("{:x}\r\n", chunk.len()).into_bytes();
        part.extend_from_slice(chunk);
        part.extend_from_slice(b"\r\n");
        parts.push(part);
    }
    parts.push(b"0\r\n\r\n".to_vec());
    parts
}

fn fixed_response(status: &str, content_type: &str, body: &str) -> Vec<Vec<u8>> {
    vec![format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
    .into_bytes()]
}

#[tokio::test]
async fn streams_chunked_answer_into_one_turn() {
    // "ü" and "ß" both straddle chunk boundaries
    let (url, server) =
        serve_once(chunked_response(&[b"Gr\xC3", b"\xBC\xC3", b"\x9F Gott", b", Welt"])).await;
    let transport = HttpTransport::new(&url);
    let session = ChatSession::new();

    let outcome = session
        .submit("How do I greet?", Some(report()), &transport)
        .await
        .expect("accepted");

    assert_eq!(outcome, TurnOutcome::Answered("Grüß Gott, Welt".to_string()));
    let conv = session.conversation();
    assert_eq!(conv.len(), 2);
    assert_eq!(conv.turns()[1].role, ChatRole::Assistant);
    assert_eq!(conv.turns()[1].content, "Grüß Gott, Welt");
    assert!(!session.is_in_flight());

    let request = server.await.expect("server task completes");
    assert!(request.starts_with("POST /query/ HTTP/1.1"));
    assert!(request.contains("name=\"query\""));
    assert!(request.contains("How do I greet?"));
    assert!(request.contains("name=\"pdf\"; filename=\"report.pdf\""));
    assert!(request.contains("%PDF-1.4 fake document"));
}

#[tokio::test]
async fn json_answer_is_accepted() {
    let (url, server) = serve_once(fixed_response(
        "200 OK",
        "application/json",
        r#"{"answer":"The PDF is about rivers."}"#,
    ))
    .await;
    let transport = HttpTransport::new(&url);
    let session = ChatSession::new();

    let outcome = session
        .submit("topic?", Some(report()), &transport)
        .await
        .expect("accepted");

    assert_eq!(outcome, TurnOutcome::Answered("The PDF is about rivers.".into()));
    server.await.expect("server task completes");
}

#[tokio::test]
async fn error_status_carries_service_detail() {
    let (url, server) = serve_once(fixed_response(
        "400 Bad Request",
        "application/json",
        r#"{"error":"Missing query or PDF "}"#,
    ))
    .await;
    let transport = HttpTransport::new(&url);

    let payload = QueryPayload::build("q", Some(report())).expect("payload");
    let err = transport.send_query(payload).await.expect_err("status error");

    match err {
        TransportError::Status { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail.as_deref(), Some("Missing query or PDF "));
        }
        other => panic!("unexpected error: {other}"),
    }
    server.await.expect("server task completes");
}

#[tokio::test]
async fn server_error_becomes_assistant_message() {
    let (url, server) = serve_once(fixed_response(
        "500 Internal Server Error",
        "application/json",
        r#"{"error":"model crashed"}"#,
    ))
    .await;
    let transport = HttpTransport::new(&url);
    let session = ChatSession::new();

    let outcome = session
        .submit("q", Some(report()), &transport)
        .await
        .expect("accepted");

    assert_eq!(outcome, TurnOutcome::Failed(TurnFailure::Transport));
    let last = session.conversation().last().cloned().expect("assistant turn");
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, TRANSPORT_ERROR_MESSAGE);
    assert!(!session.is_in_flight());
    server.await.expect("server task completes");
}

#[tokio::test]
async fn zero_length_body_is_empty() {
    let (url, server) = serve_once(fixed_response("200 OK", "text/plain", "")).await;
    let transport = HttpTransport::new(&url);

    let payload = QueryPayload::build("q", Some(report())).expect("payload");
    let body = transport.send_query(payload).await.expect("response");
    assert!(matches!(body, AnswerBody::Empty));
    server.await.expect("server task completes");
}

#[tokio::test]
async fn empty_body_becomes_warning_turn() {
    let (url, server) = serve_once(fixed_response("200 OK", "text/plain", "")).await;
    let transport = HttpTransport::new(&url);
    let session = ChatSession::new();

    let outcome = session
        .submit("q", Some(report()), &transport)
        .await
        .expect("accepted");

    assert_eq!(outcome, TurnOutcome::Failed(TurnFailure::EmptyBody));
    assert_eq!(
        session.conversation().last().map(|t| t.content.clone()),
        Some(EMPTY_BODY_MESSAGE.to_string())
    );
    server.await.expect("server task completes");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let transport = HttpTransport::new(&format!("http://{}", addr));
    let session = ChatSession::new();

    let outcome = session
        .submit("anyone there?", Some(report()), &transport)
        .await
        .expect("accepted");

    assert_eq!(outcome, TurnOutcome::Failed(TurnFailure::Transport));
    assert_eq!(session.conversation().len(), 2);
    assert!(!session.is_in_flight());
}

#[tokio::test]
async fn upload_posts_file_field() {
    let (url, server) = serve_once(fixed_response(
        "200 OK",
        "application/json",
        r#"{"status":"indexed","chunks":12}"#,
    ))
    .await;
    let transport = HttpTransport::new(&url);

    let value = transport.upload(&report()).await.expect("upload succeeds");
    assert_eq!(value["status"], "indexed");
    assert_eq!(value["chunks"], 12);

    let request = server.await.expect("server task completes");
    assert!(request.starts_with("POST /upload/ HTTP/1.1"));
    assert!(request.contains("name=\"file\"; filename=\"report.pdf\""));
}
