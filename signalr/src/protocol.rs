//! SignalR JSON hub protocol framing.
//!
//! Every message is a JSON object terminated by the ASCII record separator
//! (`0x1E`). A single WebSocket text frame may carry several records.
//!
//! ```text
//! client ── {"protocol":"json","version":1}␞ ──────────────> server
//! client <───────────────────────────────────────── {}␞ ─── server
//! client <── {"type":1,"target":"ReceiveNotification","arguments":[...]}␞
//! client ── {"type":6}␞ (keep-alive) ──────────────────────> server
//! client <── {"type":7,"error":"...","allowReconnect":true}␞
//! ```

use boxoffice_core::hub::HubError;
use serde::Deserialize;
use serde_json::Value;

/// Terminates every protocol record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const STREAM_ITEM: u8 = 2;
const COMPLETION: u8 = 3;
const PING: u8 = 6;
const CLOSE: u8 = 7;

/// Decoded server → client message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server invoked a client method
    Invocation {
        /// Method (event) name
        target: String,
        /// Positional arguments
        arguments: Vec<Value>,
    },
    /// Item of a server stream
    StreamItem {
        /// Stream the item belongs to
        invocation_id: Option<String>,
    },
    /// Result of a client-initiated invocation
    Completion {
        /// Invocation being completed
        invocation_id: Option<String>,
        /// Failure reported by the server
        error: Option<String>,
    },
    /// Keep-alive
    Ping,
    /// Server is closing the connection
    Close {
        /// Reason, when the close is abnormal
        error: Option<String>,
        /// Whether the client may reconnect automatically
        allow_reconnect: bool,
    },
    /// Message type this client does not handle
    Other(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

impl TryFrom<RawMessage> for HubMessage {
    type Error = HubError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Ok(match raw.kind {
            INVOCATION => Self::Invocation {
                target: raw
                    .target
                    .ok_or_else(|| HubError::Protocol("invocation without target".to_string()))?,
                arguments: raw.arguments,
            },
            STREAM_ITEM => Self::StreamItem {
                invocation_id: raw.invocation_id,
            },
            COMPLETION => Self::Completion {
                invocation_id: raw.invocation_id,
                error: raw.error,
            },
            PING => Self::Ping,
            CLOSE => Self::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            },
            other => Self::Other(other),
        })
    }
}

#[derive(Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Split a text frame into its non-empty records.
pub fn records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Decode a single record.
///
/// # Errors
///
/// Returns [`HubError::Protocol`] if the record is not a valid hub message.
pub fn parse_message(record: &str) -> Result<HubMessage, HubError> {
    let raw: RawMessage = serde_json::from_str(record)
        .map_err(|e| HubError::Protocol(format!("invalid hub message: {e}")))?;
    HubMessage::try_from(raw)
}

/// Decode every record of a text frame.
///
/// # Errors
///
/// Returns [`HubError::Protocol`] on the first record that is not a valid
/// hub message.
pub fn parse_messages(frame: &str) -> Result<Vec<HubMessage>, HubError> {
    records(frame).map(parse_message).collect()
}

/// Handshake request selecting the JSON protocol, version 1.
#[must_use]
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{RECORD_SEPARATOR}"#)
}

/// Check the server's handshake response record.
///
/// # Errors
///
/// Returns [`HubError::Handshake`] if the server reported an error or the
/// record is not a handshake response.
pub fn parse_handshake_response(record: &str) -> Result<(), HubError> {
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| HubError::Handshake(format!("invalid handshake response: {e}")))?;

    match response.error {
        Some(error) => Err(HubError::Handshake(error)),
        None => Ok(()),
    }
}

/// Keep-alive record.
#[must_use]
pub fn ping_message() -> String {
    format!(r#"{{"type":{PING}}}{RECORD_SEPARATOR}"#)
}
