//! Event submission: build the signed `POST <endpoint>/v1/event`, send it once, classify the
//! answer, and hand a non-empty body to the stream relay when asked to.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};
use url::Url;

use crate::console::{Console, LogLevel};
use crate::credentials::Credentials;
use crate::error::{Result, SendEventError};
use crate::payload::EventPayload;
use crate::relay::Relay;
use crate::signer::{sign, Signature};

/// Resource path, replacing whatever path the endpoint carries.
pub const EVENT_PATH: &str = "v1/event";
pub const SIGNATURE_HEADER: &str = "X-Beacon-Signature";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Upper bound on a success body; it only ever carries channel info.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

pub const TIMEOUT_ENV: &str = "BEACON_TIMEOUT_SECS";
pub const SKIP_CERT_VERIFY_ENV: &str = "BEACON_SKIP_CERT_VERIFY";

/// Request construction settings shared by the submitter and the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitConfig {
    /// Bounds the whole HTTP exchange and the web socket handshake.
    pub timeout: Duration,
    /// Accept any server certificate. On by default: deployments commonly run behind
    /// self-signed certificates. Security relevant; turn off with `BEACON_SKIP_CERT_VERIFY=false`.
    pub skip_certificate_verification: bool,
    pub signature_header: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            skip_certificate_verification: true,
            signature_header: SIGNATURE_HEADER.to_string(),
        }
    }
}

impl SubmitConfig {
    /// Reads `BEACON_TIMEOUT_SECS` and `BEACON_SKIP_CERT_VERIFY`; unset or invalid values keep
    /// the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(skip) = config::env_flag(SKIP_CERT_VERIFY_ENV) {
            cfg.skip_certificate_verification = skip;
        }
        cfg
    }
}

/// A request ready to send. The body is the payload buffer the signature was computed over.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: Url,
    pub signature: Signature,
    pub body: Bytes,
}

/// Classified HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    SuccessEmpty,
    SuccessWithBody(Bytes),
    Failure { status: StatusCode, message: String },
}

/// Status line as the server sent it. The server's reason phrase wins; without one the
/// canonical phrase is used, and a code with neither is rendered bare.
pub fn status_line(status: StatusCode, reason: Option<&str>) -> String {
    match reason.filter(|r| !r.is_empty()).or_else(|| status.canonical_reason()) {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

impl ResponseOutcome {
    /// 2xx is success, split on whether the body is empty; everything else is a failure whose
    /// message is the status line (see [`status_line`]).
    pub fn classify(status: StatusCode, reason: Option<&str>, body: Bytes) -> Self {
        if !status.is_success() {
            return ResponseOutcome::Failure {
                status,
                message: status_line(status, reason),
            };
        }
        if body.is_empty() {
            ResponseOutcome::SuccessEmpty
        } else {
            ResponseOutcome::SuccessWithBody(body)
        }
    }
}

/// `endpoint` with its path replaced by [`EVENT_PATH`]; scheme, host, port and query are kept.
pub fn event_url(endpoint: &Url) -> Url {
    let mut url = endpoint.clone();
    url.set_path(EVENT_PATH);
    url
}

#[derive(Debug, Clone)]
pub struct EventSubmitter {
    client: reqwest::Client,
    config: SubmitConfig,
}

impl EventSubmitter {
    /// # Errors
    ///
    /// `SendEventError::Client` when the HTTP client cannot be built.
    pub fn new(config: SubmitConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.skip_certificate_verification)
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SendEventError::Client)?;
        Ok(Self { client, config })
    }

    /// Signs the payload bytes as they are; no re-encoding happens between signing and sending.
    pub fn build_request(&self, payload: &EventPayload, credentials: &Credentials) -> Result<SignedRequest> {
        let signature = sign(payload.as_bytes(), credentials.secret.as_bytes())?;
        Ok(SignedRequest {
            url: event_url(&credentials.endpoint),
            signature,
            body: payload.to_bytes(),
        })
    }

    /// Sends exactly one request and classifies the answer. Transport failures (connect, DNS,
    /// timeout, body read) and an oversized success body are errors; HTTP statuses are
    /// [`ResponseOutcome`]s.
    pub async fn send(&self, request: SignedRequest) -> Result<ResponseOutcome> {
        let span = info_span!("send_event", url = %request.url, bytes = request.body.len());
        async move {
            tracing::debug!("Sending event");
            let response = self
                .client
                .post(request.url.clone())
                .header(self.config.signature_header.as_str(), request.signature.as_str())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(request.body)
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!(timeout = e.is_timeout(), connect = e.is_connect(), "Request failed: {}", e);
                    SendEventError::Transport(e)
                })?;

            let status = response.status();
            let reason = response
                .extensions()
                .get::<hyper::ext::ReasonPhrase>()
                .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());
            if !status.is_success() {
                tracing::debug!(status = status.as_u16(), ?reason, "Received failure response");
                return Ok(ResponseOutcome::classify(status, reason.as_deref(), Bytes::new()));
            }
            let body = read_body(response, MAX_RESPONSE_BYTES).await?;
            tracing::debug!(status = status.as_u16(), body_len = body.len(), "Received response");
            Ok(ResponseOutcome::classify(status, reason.as_deref(), body))
        }
        .instrument(span)
        .await
    }

    /// Full submission: sign, send, classify, and optionally follow the stream.
    ///
    /// - failure status: prints a quiet notice and returns `SendEventError::Protocol`.
    /// - transport error: prints the same notice and returns `SendEventError::Transport`.
    /// - 2xx with a body over [`MAX_RESPONSE_BYTES`]: same notice, `SendEventError::ResponseTooLarge`.
    /// - 2xx, empty body: prints "Response is empty" and returns `Ok`, never relaying.
    /// - 2xx with body: relays when `follow_stream` is set, else returns `Ok`.
    ///
    /// Cancellation before the HTTP answer arrives yields `SendEventError::Cancelled`.
    pub async fn submit(
        &self,
        payload: &EventPayload,
        credentials: &Credentials,
        follow_stream: bool,
        relay: &dyn Relay,
        console: &mut Console,
        cancel: CancellationToken,
    ) -> Result<()> {
        let request = self.build_request(payload, credentials)?;

        let outcome = tokio::select! {
            res = self.send(request) => res,
            _ = cancel.cancelled() => return Err(SendEventError::Cancelled),
        };

        match outcome {
            Err(e) => Err(report_failure(console, e)),
            Ok(ResponseOutcome::Failure { message, .. }) => {
                Err(report_failure(console, SendEventError::protocol(message)))
            }
            Ok(ResponseOutcome::SuccessEmpty) => {
                console.print_log("Response is empty", LogLevel::Info)?;
                Ok(())
            }
            Ok(ResponseOutcome::SuccessWithBody(body)) => {
                if !follow_stream {
                    tracing::debug!("Not following the stream (flag not set)");
                    return Ok(());
                }
                relay
                    .relay(&body, &credentials.endpoint, console, cancel)
                    .await
                    .map_err(SendEventError::from)
            }
        }
    }
}

/// Prints the failure notice and hands back `err`. The submission error stays the one reported;
/// a failed notice write is only logged.
fn report_failure(console: &mut Console, err: SendEventError) -> SendEventError {
    if let Err(e) = console.print_log("Send event was unsuccessful", LogLevel::Quiet) {
        tracing::warn!("failed to write failure notice: {}", e);
    }
    err
}

/// Reads at most `limit` body bytes; a longer body (declared or streamed) is an error.
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<Bytes> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        tracing::warn!(content_length = response.content_length(), limit, "Response body too large");
        return Err(SendEventError::ResponseTooLarge { limit });
    }
    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        tracing::warn!("Failed to read response body: {}", e);
        SendEventError::Transport(e)
    })? {
        if body.len() + chunk.len() > limit {
            tracing::warn!(limit, "Response body too large");
            return Err(SendEventError::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}
