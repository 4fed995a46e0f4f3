//! Beacon wire types: what the event endpoint answers and what the follow-up stream carries.
//!
//! - [`ConnectionData`] / [`ChannelInfo`]: body of a successful `POST /v1/event`, naming the
//!   channel the client subscribes to for follow-up messages.
//! - [`LogEvent`]: one streamed message (type + data), rendered by the relay.
//!
//! This crate has no I/O; it only defines shapes and decoding helpers.

pub mod channel;
pub mod event;

pub use channel::{ChannelInfo, ConnectionData, CHANNEL_ID_HEADER, TOKEN_HEADER};
pub use event::{LogData, LogEvent, LogLevel, StreamMessage, LOG_EVENT_TYPE};
