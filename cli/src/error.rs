//! Error types for `beacon send event`.
//!
//! [`SendEventError`] is what the command boundary sees. Each variant maps onto one failure
//! class: configuration (credentials), input (payload file), transport, protocol (non-2xx),
//! and stream (the follow-up relay). The leaf errors below stay specific to the component
//! that raises them.

use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Shown whenever credentials cannot be obtained.
pub const AUTH_ERROR_MSG: &str = "This command requires to be authenticated. Set BEACON_ENDPOINT \
and BEACON_API_TOKEN (environment, .env, or the [credentials] table of ~/.config/beacon/config.toml)";

/// Result type alias for the send-event flow.
pub type Result<T> = std::result::Result<T, SendEventError>;

/// Event file could not be used as a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to read event file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event file is empty")]
    Empty,
    #[error("event file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Credential provider failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{0} is not set")]
    Missing(String),
    #[error("invalid endpoint {value:?}: {reason}")]
    InvalidEndpoint { value: String, reason: String },
    #[error("api token is empty")]
    EmptyToken,
    #[error("credential store: {0}")]
    Store(String),
}

/// Signing preconditions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("signing secret is empty")]
    EmptySecret,
}

/// Failures while following the event's log stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("response is not channel info: {0}")]
    InvalidChannelInfo(#[source] serde_json::Error),
    #[error("could not open web socket because the token is missing")]
    MissingToken,
    #[error("could not open web socket because the channel id is missing")]
    MissingChannelId,
    #[error("invalid web socket url: {0}")]
    InvalidUrl(String),
    #[error("invalid handshake header: {0}")]
    InvalidHeader(String),
    #[error("tls setup failed: {0}")]
    Tls(#[source] native_tls::Error),
    #[error("web socket connect timed out after {0}s")]
    ConnectTimeout(u64),
    #[error("web socket connect failed: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("web socket read failed: {0}")]
    Read(#[source] tungstenite::Error),
    #[error("could not decode stream message: {0}")]
    Decode(String),
    #[error("failed to write stream output: {0}")]
    Output(#[source] std::io::Error),
}

/// Top-level error of the send-event command.
#[derive(Debug, Error)]
pub enum SendEventError {
    /// Missing or invalid credentials; no network call was made.
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Input(#[from] PayloadError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection refused, DNS failure, timeout, or a broken response body.
    #[error("send event failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx answer; `status` is the status line as sent, e.g. `404 Not Found`.
    #[error("{status}")]
    Protocol { status: String },

    /// 2xx answer whose body is larger than a channel-info document can be.
    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// Console output could not be written (e.g. stdout is a closed pipe).
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// The event was accepted; only following its stream failed.
    #[error("event was sent, but following its log stream failed: {0}")]
    Stream(#[from] StreamError),

    #[error("interrupted")]
    Cancelled,
}

impl SendEventError {
    /// Wraps a credential failure into the authentication message.
    pub fn auth(err: CredentialError) -> Self {
        Self::Configuration(format!("{AUTH_ERROR_MSG}: {err}"))
    }

    pub fn protocol(status: impl Into<String>) -> Self {
        Self::Protocol { status: status.into() }
    }

    /// True for failures raised before any request left the process.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Input(_) | Self::Sign(_) | Self::Client(_)
        )
    }
}
