//! EventSubmitter against a mock HTTP server.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cli::submit::MAX_RESPONSE_BYTES;
use cli::{
    sign, verify_signature, Console, Credentials, EventPayload, EventSubmitter, LogLevel, Relay, SendEventError,
    SharedBuffer, StreamError, SubmitConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN: &str = "api-token-123";
const EVENT: &str = "{\n  \"type\": \"sh.beacon.event.deployment.triggered\",\n  \"data\": {\"project\": \"sockshop\"}\n}\n";

/// Records every body handed to it instead of opening a socket.
#[derive(Default)]
struct RecordingRelay(Mutex<Vec<Vec<u8>>>);

impl RecordingRelay {
    fn calls(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Relay for RecordingRelay {
    async fn relay(
        &self,
        initial_body: &[u8],
        _endpoint: &Url,
        console: &mut Console,
        _cancel: CancellationToken,
    ) -> Result<(), StreamError> {
        self.0.lock().unwrap().push(initial_body.to_vec());
        console.println("relayed").map_err(StreamError::Output)
    }
}

/// Serves one request: reads it through the end of the event body, then writes `response`
/// verbatim. Used where the exact status line or framing matters.
async fn spawn_raw_server(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request.ends_with(EVENT.as_bytes()) {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let _ = stream.write_all(&response).await;
        let _ = stream.shutdown().await;
    });
    format!("http://{}", addr)
}

fn payload() -> EventPayload {
    EventPayload::from_bytes(EVENT.as_bytes().to_vec()).unwrap()
}

fn creds(server: &MockServer) -> Credentials {
    Credentials::new(&server.uri(), TOKEN).unwrap()
}

fn submitter() -> EventSubmitter {
    EventSubmitter::new(SubmitConfig {
        timeout: Duration::from_secs(5),
        ..SubmitConfig::default()
    })
    .unwrap()
}

fn console() -> (Console, SharedBuffer) {
    let buf = SharedBuffer::new();
    (Console::new(LogLevel::Info, buf.clone()), buf)
}

#[tokio::test]
async fn posts_signed_body_to_event_path() {
    let server = MockServer::start().await;
    let expected = sign(EVENT.as_bytes(), TOKEN.as_bytes()).unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/event"))
        .and(header("X-Beacon-Signature", expected.as_str()))
        .and(header("content-type", "application/json"))
        .and(body_bytes(EVENT.as_bytes().to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let relay = RecordingRelay::default();
    let (mut console, _) = console();
    submitter()
        .submit(&payload(), &creds(&server), false, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap();

    let received: Vec<Request> = server.received_requests().await.unwrap();
    let sig = received[0].headers.get("X-Beacon-Signature").unwrap().to_str().unwrap();
    assert!(verify_signature(&received[0].body, sig, TOKEN.as_bytes()));
}

#[tokio::test]
async fn endpoint_path_is_replaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/event"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let creds = Credentials::new(&format!("{}/api/ignored", server.uri()), TOKEN).unwrap();
    let relay = RecordingRelay::default();
    let (mut console, _) = console();
    submitter()
        .submit(&payload(), &creds, false, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_success_never_relays() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let relay = RecordingRelay::default();
    let (mut console, buf) = console();
    submitter()
        .submit(&payload(), &creds(&server), true, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap();

    assert!(relay.calls().is_empty());
    assert_eq!(buf.lines(), vec!["Response is empty".to_string()]);
}

#[tokio::test]
async fn body_is_relayed_only_when_following() {
    let server = MockServer::start().await;
    let body = r#"{"channelInfo":{"token":"ws-token","channelID":"chan-1"}}"#;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(2)
        .mount(&server)
        .await;

    let relay = RecordingRelay::default();
    let (mut console, buf) = console();
    submitter()
        .submit(&payload(), &creds(&server), false, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap();
    assert!(relay.calls().is_empty());
    assert!(buf.contents().is_empty());

    submitter()
        .submit(&payload(), &creds(&server), true, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(relay.calls(), vec![body.as_bytes().to_vec()]);
    assert_eq!(buf.lines(), vec!["relayed".to_string()]);
}

#[tokio::test]
async fn failure_status_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"channelInfo":{"token":"t","channelID":"c"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let relay = RecordingRelay::default();
    let buf = SharedBuffer::new();
    let mut console = Console::new(LogLevel::Quiet, buf.clone());
    let err = submitter()
        .submit(&payload(), &creds(&server), true, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(&err, SendEventError::Protocol { status } if status == "404 Not Found"));
    assert_eq!(err.to_string(), "404 Not Found");
    assert_eq!(buf.lines(), vec!["Send event was unsuccessful".to_string()]);
    assert!(relay.calls().is_empty());
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let creds = Credentials::new(&format!("http://{}", addr), TOKEN).unwrap();
    let relay = RecordingRelay::default();
    let (mut console, buf) = console();
    let err = submitter()
        .submit(&payload(), &creds, true, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SendEventError::Transport(_)));
    assert_eq!(buf.lines(), vec!["Send event was unsuccessful".to_string()]);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let submitter = EventSubmitter::new(SubmitConfig {
        timeout: Duration::from_millis(300),
        ..SubmitConfig::default()
    })
    .unwrap();
    let relay = RecordingRelay::default();
    let (mut console, _) = console();
    let err = submitter
        .submit(&payload(), &creds(&server), false, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SendEventError::Transport(e) => assert!(e.is_timeout()),
        other => panic!("expected transport timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_during_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let relay = RecordingRelay::default();
    let (mut console, _) = console();
    let err = tokio::time::timeout(
        Duration::from_secs(2),
        submitter().submit(&payload(), &creds(&server), true, &relay, &mut console, cancel),
    )
    .await
    .expect("submit did not honour cancellation")
    .unwrap_err();
    assert!(matches!(err, SendEventError::Cancelled));
}

#[tokio::test]
async fn failure_keeps_the_servers_reason_phrase() {
    for (line, expected) in [
        ("403 Project not allowed", "403 Project not allowed"),
        ("599 Network Connect Timeout", "599 Network Connect Timeout"),
        ("500 Internal Server Error", "500 Internal Server Error"),
    ] {
        let response = format!("HTTP/1.1 {line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        let endpoint = spawn_raw_server(response.into_bytes()).await;
        let creds = Credentials::new(&endpoint, TOKEN).unwrap();
        let relay = RecordingRelay::default();
        let (mut console, _) = console();
        let err = submitter()
            .submit(&payload(), &creds, true, &relay, &mut console, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SendEventError::Protocol { .. }), "{line}: {err:?}");
        assert_eq!(err.to_string(), expected);
    }
}

#[tokio::test]
async fn oversized_success_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(MAX_RESPONSE_BYTES + 1)))
        .expect(1)
        .mount(&server)
        .await;

    let relay = RecordingRelay::default();
    let (mut console, buf) = console();
    let err = submitter()
        .submit(&payload(), &creds(&server), true, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SendEventError::ResponseTooLarge { limit } if limit == MAX_RESPONSE_BYTES));
    assert!(relay.calls().is_empty());
    assert_eq!(buf.lines(), vec!["Send event was unsuccessful".to_string()]);
}

#[tokio::test]
async fn oversized_chunked_body_is_rejected() {
    let chunk = "y".repeat(16 * 1024);
    let mut response = b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n".to_vec();
    for _ in 0..(MAX_RESPONSE_BYTES / chunk.len() + 1) {
        response.extend_from_slice(format!("{:x}\r\n{}\r\n", chunk.len(), chunk).as_bytes());
    }
    response.extend_from_slice(b"0\r\n\r\n");
    let endpoint = spawn_raw_server(response).await;

    let creds = Credentials::new(&endpoint, TOKEN).unwrap();
    let relay = RecordingRelay::default();
    let (mut console, _) = console();
    let err = submitter()
        .submit(&payload(), &creds, true, &relay, &mut console, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SendEventError::ResponseTooLarge { .. }));
    assert!(relay.calls().is_empty());
}
