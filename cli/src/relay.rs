//! Stream relay: follow an accepted event's log messages over a web socket.
//!
//! The submission body names a channel (`{"channelInfo": {"token", "channelID"}}`). The relay
//! connects to the endpoint with its scheme switched to `ws`/`wss`, presents the channel in the
//! handshake headers, and prints each message as it arrives.
//!
//! States: connecting -> streaming -> closing, or failed. A reader task decodes frames into a
//! channel; the rendering loop selects on that channel and the cancellation token, so an
//! interrupt is honoured even while no frame is arriving. The connection is closed exactly once
//! on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use stream_event::{ConnectionData, StreamMessage, CHANNEL_ID_HEADER, TOKEN_HEADER};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::console::Console;
use crate::error::StreamError;
use crate::submit::SubmitConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Decoded frames buffered between the reader task and the renderer.
const MESSAGE_BUFFER: usize = 64;

/// Follows the stream named by a submission body.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(
        &self,
        initial_body: &[u8],
        endpoint: &Url,
        console: &mut Console,
        cancel: CancellationToken,
    ) -> Result<(), StreamError>;
}

/// How a relay session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Peer sent a close frame or dropped the connection.
    RemoteClosed,
    /// Peer sent a log event marked `terminate`.
    Terminated,
    /// Local cancellation (e.g. Ctrl-C).
    Cancelled,
}

/// `endpoint` with `http -> ws` and `https -> wss`; host, port and path are kept.
pub fn websocket_url(endpoint: &Url) -> Result<Url, StreamError> {
    let scheme = match endpoint.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(StreamError::InvalidUrl(format!("unsupported scheme {other}"))),
    };
    let mut url = endpoint.clone();
    url.set_scheme(scheme)
        .map_err(|_| StreamError::InvalidUrl(endpoint.to_string()))?;
    Ok(url)
}

/// Reads the channel from a submission body; both token and channel id are required.
pub fn channel_from_body(body: &[u8]) -> Result<ConnectionData, StreamError> {
    let data = ConnectionData::from_slice(body).map_err(StreamError::InvalidChannelInfo)?;
    if data.channel_info.token.is_empty() {
        return Err(StreamError::MissingToken);
    }
    if data.channel_info.channel_id.is_empty() {
        return Err(StreamError::MissingChannelId);
    }
    Ok(data)
}

fn handshake_request(url: &Url, data: &ConnectionData) -> Result<Request<()>, StreamError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| StreamError::InvalidUrl(e.to_string()))?;
    let header = |v: &str| HeaderValue::from_str(v).map_err(|e| StreamError::InvalidHeader(e.to_string()));
    let headers = request.headers_mut();
    headers.insert(TOKEN_HEADER, header(&data.channel_info.token)?);
    headers.insert(CHANNEL_ID_HEADER, header(&data.channel_info.channel_id)?);
    Ok(request)
}

fn decode_frame(msg: Message) -> Option<Result<StreamMessage, StreamError>> {
    match msg {
        Message::Text(text) => Some(decode_text(&text)),
        Message::Binary(bytes) => Some(
            String::from_utf8(bytes)
                .map_err(|e| StreamError::Decode(format!("binary frame is not UTF-8: {e}")))
                .and_then(|text| decode_text(&text)),
        ),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Close(_) => None,
    }
}

fn decode_text(text: &str) -> Result<StreamMessage, StreamError> {
    StreamMessage::decode(text).map_err(|e| StreamError::Decode(e.to_string()))
}

fn render(console: &mut Console, msg: &StreamMessage) -> Result<(), StreamError> {
    match msg {
        StreamMessage::Log(event) => console.print_log(&event.data.message, event.data.log_level),
        StreamMessage::Text(text) => console.println(text),
    }
    .map_err(StreamError::Output)
}

/// Write half of the socket; `close` sends the close frame at most once.
struct Connection {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

impl Connection {
    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.sink.close().await {
            Ok(()) => debug!("web socket closed"),
            Err(e) => debug!("web socket close: {}", e),
        }
    }
}

/// Decodes frames in arrival order until the peer closes, a frame fails, or the receiver is
/// gone. Dropping `tx` is the end-of-stream signal.
async fn read_frames(
    mut read: SplitStream<WsStream>,
    tx: mpsc::Sender<Result<StreamMessage, StreamError>>,
) {
    while let Some(next) = read.next().await {
        let item = match next {
            Ok(Message::Close(frame)) => {
                debug!(?frame, "peer closed the stream");
                break;
            }
            Ok(msg) => match decode_frame(msg) {
                Some(item) => item,
                None => continue,
            },
            Err(e) => Err(StreamError::Read(e)),
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            break;
        }
    }
}

/// Web socket relay built from the same trust and timeout settings as the submitter.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    connect_timeout: Duration,
    skip_certificate_verification: bool,
}

impl StreamRelay {
    pub fn new(config: &SubmitConfig) -> Self {
        Self {
            connect_timeout: config.timeout,
            skip_certificate_verification: config.skip_certificate_verification,
        }
    }

    fn connector(&self) -> Result<Option<Connector>, StreamError> {
        if !self.skip_certificate_verification {
            return Ok(None);
        }
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(StreamError::Tls)?;
        Ok(Some(Connector::NativeTls(tls)))
    }

    async fn connect(&self, request: Request<()>) -> Result<WsStream, StreamError> {
        let connector = self.connector()?;
        let (ws, _) = tokio::time::timeout(
            self.connect_timeout,
            connect_async_tls_with_config(request, None, false, connector),
        )
        .await
        .map_err(|_| StreamError::ConnectTimeout(self.connect_timeout.as_secs()))?
        .map_err(StreamError::Connect)?;
        Ok(ws)
    }

    /// Connects and renders messages until the stream ends. Returns how it ended.
    pub async fn follow(
        &self,
        initial_body: &[u8],
        endpoint: &Url,
        console: &mut Console,
        cancel: CancellationToken,
    ) -> Result<RelayEnd, StreamError> {
        let data = channel_from_body(initial_body)?;
        let url = websocket_url(endpoint)?;
        let request = handshake_request(&url, &data)?;

        info!(url = %url, channel_id = %data.channel_info.channel_id, "Opening web socket");
        let ws = tokio::select! {
            res = self.connect(request) => res?,
            _ = cancel.cancelled() => return Ok(RelayEnd::Cancelled),
        };

        let (sink, read) = ws.split();
        let mut conn = Connection { sink, closed: false };
        let (tx, mut rx) = mpsc::channel(MESSAGE_BUFFER);
        let reader = tokio::spawn(read_frames(read, tx));

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
                item = rx.recv() => match item {
                    Some(Ok(msg)) => {
                        if let Err(e) = render(console, &msg) {
                            break Err(e);
                        }
                        if msg.is_terminal() {
                            break Ok(RelayEnd::Terminated);
                        }
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(RelayEnd::RemoteClosed),
                },
            }
        };

        reader.abort();
        conn.close().await;
        match &result {
            Ok(end) => info!(?end, "Stream finished"),
            Err(e) => warn!("Stream failed: {}", e),
        }
        result
    }
}

#[async_trait]
impl Relay for StreamRelay {
    async fn relay(
        &self,
        initial_body: &[u8],
        endpoint: &Url,
        console: &mut Console,
        cancel: CancellationToken,
    ) -> Result<(), StreamError> {
        self.follow(initial_body, endpoint, console, cancel).await.map(|_| ())
    }
}
