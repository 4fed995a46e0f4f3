//! Channel info returned by the event endpoint.
//!
//! ```json
//! {"channelInfo": {"token": "...", "channelID": "..."}}
//! ```

use serde::{Deserialize, Serialize};

/// Handshake header carrying [`ChannelInfo::token`].
pub const TOKEN_HEADER: &str = "token";
/// Handshake header carrying [`ChannelInfo::channel_id`].
pub const CHANNEL_ID_HEADER: &str = "x-beacon-ws-channel-id";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "channelID", default)]
    pub channel_id: String,
}

/// Top-level submission response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    #[serde(rename = "channelInfo", default)]
    pub channel_info: ChannelInfo,
}

impl ConnectionData {
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel_info: ChannelInfo {
                token: token.into(),
                channel_id: channel_id.into(),
            },
        }
    }

    /// Decodes a submission body. Missing fields decode as empty strings; callers decide
    /// whether an empty token is acceptable.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_field_names() {
        let data = ConnectionData::from_slice(br#"{"channelInfo":{"token":"t-1","channelID":"c-9"}}"#).unwrap();
        assert_eq!(data, ConnectionData::new("t-1", "c-9"));
    }

    #[test]
    fn missing_fields_decode_empty() {
        let data = ConnectionData::from_slice(br#"{"channelInfo":{"token":"t-1"}}"#).unwrap();
        assert_eq!(data.channel_info.token, "t-1");
        assert!(data.channel_info.channel_id.is_empty());

        let data = ConnectionData::from_slice(b"{}").unwrap();
        assert_eq!(data, ConnectionData::default());
    }

    #[test]
    fn serializes_with_wire_names() {
        let value = serde_json::to_value(ConnectionData::new("a", "b")).unwrap();
        assert_eq!(value["channelInfo"]["token"], "a");
        assert_eq!(value["channelInfo"]["channelID"], "b");
    }

    #[test]
    fn non_json_body_is_an_error() {
        assert!(ConnectionData::from_slice(b"accepted").is_err());
    }
}
