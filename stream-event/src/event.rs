//! Streamed follow-up messages.
//!
//! A log message on the wire:
//!
//! ```json
//! {"type": "sh.beacon.events.log", "data": {"message": "deploying", "terminate": false, "logLevel": "INFO"}}
//! ```
//!
//! Any other text frame is shown as-is.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` value of a log event.
pub const LOG_EVENT_TYPE: &str = "sh.beacon.events.log";

/// Output level, ordered from least to most chatty.
///
/// A message prints when its level is `<=` the configured verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Quiet,
    #[default]
    Info,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "QUIET",
            LogLevel::Info => "INFO",
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl From<String> for LogLevel {
    /// Lenient: `ERROR`/`QUIET` -> Quiet, `DEBUG` -> Debug, `VERBOSE` -> Verbose, anything else Info.
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" | "QUIET" => LogLevel::Quiet,
            "VERBOSE" => LogLevel::Verbose,
            "DEBUG" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogData {
    pub message: String,
    /// Set by the server on the last message of a channel.
    #[serde(default)]
    pub terminate: bool,
    #[serde(rename = "logLevel", default)]
    pub log_level: LogLevel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: LogData,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, log_level: LogLevel, terminate: bool) -> Self {
        Self {
            event_type: LOG_EVENT_TYPE.to_string(),
            data: LogData {
                message: message.into(),
                terminate,
                log_level,
            },
        }
    }
}

/// One decoded stream frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Log(LogEvent),
    Text(String),
}

impl StreamMessage {
    /// Decodes a text frame. Only a frame that claims to be a log event and does not match
    /// its shape is an error; everything else falls back to [`StreamMessage::Text`].
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return Ok(StreamMessage::Text(text.to_string())),
        };
        let is_log = value.get("type").and_then(Value::as_str) == Some(LOG_EVENT_TYPE);
        if is_log {
            serde_json::from_value(value).map(StreamMessage::Log)
        } else {
            Ok(StreamMessage::Text(text.to_string()))
        }
    }

    /// True when the server marked this as the final message.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamMessage::Log(ev) if ev.data.terminate)
    }
}
