//! Socket.IO v5 over Engine.IO v4 text framing.
//!
//! Only what a websocket-only client needs: the open handshake, ping/pong,
//! default-namespace connect/disconnect and events. Binary attachments and
//! custom namespaces are not used by the room server.

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};

/// Client → server namespace connect
pub const CONNECT: &str = "40";
/// Client → server heartbeat answer
pub const PONG: &str = "3";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError {
    pub msg: String,
}

impl FrameError {
    fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad frame: {}", self.msg)
    }
}

impl std::error::Error for FrameError {}

pub fn encode_event(name: &str, data: &Value) -> String {
    format!("42{}", json!([name, data]))
}

pub fn decode(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let eio = chars.next().ok_or_else(|| FrameError::new("empty frame"))?;
    let rest = chars.as_str();
    match eio {
        '0' => {
            let hs: Handshake = serde_json::from_str(rest)
                .map_err(|e| FrameError::new(format!("handshake: {}", e)))?;
            Ok(Frame::Open(hs))
        }
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '6' => Ok(Frame::Noop),
        '4' => decode_socket_packet(rest),
        other => Err(FrameError::new(format!("unsupported engine packet '{}'", other))),
    }
}

fn decode_socket_packet(packet: &str) -> Result<Frame, FrameError> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or_else(|| FrameError::new("empty socket packet"))?;
    let body = chars.as_str();
    match kind {
        '0' => {
            if body.trim().is_empty() {
                Ok(Frame::Connect(None))
            } else {
                let v = serde_json::from_str(body)
                    .map_err(|e| FrameError::new(format!("connect: {}", e)))?;
                Ok(Frame::Connect(Some(v)))
            }
        }
        '1' => Ok(Frame::Disconnect),
        '2' => decode_event(body),
        '4' => {
            let v = serde_json::from_str(body).unwrap_or(Value::Null);
            Ok(Frame::ConnectError(v))
        }
        other => Err(FrameError::new(format!("unsupported socket packet '{}'", other))),
    }
}

fn decode_event(body: &str) -> Result<Frame, FrameError> {
    // Optional ack id precedes the JSON array
    let start = body
        .find('[')
        .ok_or_else(|| FrameError::new("event without payload array"))?;
    if !body[..start].chars().all(|c| c.is_ascii_digit()) {
        return Err(FrameError::new("namespaced events are not supported"));
    }
    let parts: Vec<Value> = serde_json::from_str(&body[start..])
        .map_err(|e| FrameError::new(format!("event: {}", e)))?;
    let mut parts = parts.into_iter();
    let name = match parts.next() {
        Some(Value::String(s)) => s,
        _ => return Err(FrameError::new("event name must be a string")),
    };
    let data = parts.next().unwrap_or(Value::Null);
    Ok(Frame::Event { name, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_open() {
        let f = decode(r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#).unwrap();
        match f {
            Frame::Open(hs) => {
                assert_eq!(hs.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(hs.ping_interval, 25000);
                assert_eq!(hs.ping_timeout, 20000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_heartbeat_and_connect() {
        assert_eq!(decode("2").unwrap(), Frame::Ping);
        assert_eq!(decode("3").unwrap(), Frame::Pong);
        assert_eq!(decode("40").unwrap(), Frame::Connect(None));
        assert!(matches!(decode(r#"40{"sid":"abc"}"#).unwrap(), Frame::Connect(Some(_))));
        assert_eq!(decode("41").unwrap(), Frame::Disconnect);
    }

    #[test]
    fn test_decode_event() {
        let f = decode(r#"42["bag_configured",{"successi":5,"complicazioni":2}]"#).unwrap();
        match f {
            Frame::Event { name, data } => {
                assert_eq!(name, "bag_configured");
                assert_eq!(data["successi"], 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_event_without_data_is_null() {
        let f = decode(r#"42["bag_reset"]"#).unwrap();
        assert_eq!(f, Frame::Event { name: "bag_reset".into(), data: Value::Null });
    }

    #[test]
    fn test_event_with_ack_id() {
        let f = decode(r#"4212["error",{"message":"Stanza non trovata"}]"#).unwrap();
        assert!(matches!(f, Frame::Event { ref name, .. } if name == "error"));
    }

    #[test]
    fn test_encode_event() {
        let s = encode_event("add_help", &json!({"room_id": "ab12cd34"}));
        assert_eq!(s, r#"42["add_help",{"room_id":"ab12cd34"}]"#);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode("").is_err());
        assert!(decode("9").is_err());
        assert!(decode("42/admin,[\"x\"]").is_err());
    }
}
