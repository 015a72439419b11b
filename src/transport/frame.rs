//! Engine.IO v4 / Socket.IO v5 text frame encoding
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by an optional payload. Engine.IO `4` (message) wraps a Socket.IO
//! packet with its own type digit, so events look like `42["name",payload]`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{OutboundEvent, TransportEvent};
use crate::models::Message;

/// Engine.IO pong, sent in reply to a server ping (`2`).
pub const PONG: &str = "3";
/// Socket.IO disconnect on the default namespace.
pub const DISCONNECT: &str = "41";

/// Handshake data carried by the Engine.IO open packet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO open (`0{...}`)
    Open { sid: String, ping_interval: u64 },
    /// Engine.IO close (`1`)
    Close,
    /// Engine.IO ping (`2`)
    Ping,
    /// Engine.IO pong (`3`)
    Pong,
    /// Socket.IO connect acknowledgement (`40{...}`)
    Connected,
    /// Socket.IO disconnect (`41`)
    Disconnected,
    /// Socket.IO event (`42["name",...]`)
    Event {
        name: String,
        args: Vec<serde_json::Value>,
    },
    /// Socket.IO connect error (`44{"message":...}`)
    ConnectError(String),
    /// Anything we don't act on (noop, upgrade, acks, binary)
    Other(String),
}

/// Decode a text frame.
pub fn decode(frame: &str) -> Result<Packet> {
    let mut chars = frame.chars();
    let eio = chars.next().context("Empty frame")?;
    let rest = chars.as_str();

    match eio {
        '0' => {
            let open: OpenInfo =
                serde_json::from_str(rest).context("Malformed Engine.IO open packet")?;
            Ok(Packet::Open {
                sid: open.sid,
                ping_interval: open.ping_interval,
            })
        }
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socketio(rest),
        _ => Ok(Packet::Other(frame.to_string())),
    }
}

fn decode_socketio(packet: &str) -> Result<Packet> {
    let mut chars = packet.chars();
    let sio = chars.next().context("Empty Socket.IO packet")?;
    let body = skip_namespace_and_ack(chars.as_str());

    match sio {
        '0' => Ok(Packet::Connected),
        '1' => Ok(Packet::Disconnected),
        '2' => {
            let mut items: Vec<serde_json::Value> =
                serde_json::from_str(body).context("Malformed Socket.IO event")?;
            if items.is_empty() {
                bail!("Socket.IO event without a name");
            }
            let name = match items.remove(0) {
                serde_json::Value::String(s) => s,
                other => bail!("Socket.IO event name is not a string: {}", other),
            };
            Ok(Packet::Event { name, args: items })
        }
        '4' => {
            let message = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| body.to_string());
            Ok(Packet::ConnectError(message))
        }
        _ => Ok(Packet::Other(format!("4{}", packet))),
    }
}

/// Strip an optional `/namespace,` prefix and numeric ack id.
fn skip_namespace_and_ack(body: &str) -> &str {
    let body = if body.starts_with('/') {
        match body.find(',') {
            Some(pos) => &body[pos + 1..],
            None => "",
        }
    } else {
        body
    };
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Socket.IO CONNECT packet carrying the auth token.
pub fn encode_connect(token: &str) -> String {
    format!("40{}", serde_json::json!({ "token": token }))
}

/// Encode an outbound chat event.
pub fn encode_event(event: &OutboundEvent) -> Result<String> {
    let mut items = vec![serde_json::Value::String(event.name().to_string())];
    match event {
        OutboundEvent::Message(msg) => {
            items.push(serde_json::to_value(msg).context("Failed to encode message")?)
        }
        OutboundEvent::MessageRead(id) => items.push(serde_json::Value::String(id.clone())),
        OutboundEvent::Typing(is_typing) => items.push(serde_json::Value::Bool(*is_typing)),
        OutboundEvent::Alert => {}
    }
    Ok(format!("42{}", serde_json::Value::Array(items)))
}

/// Map a Socket.IO event onto a chat event. Unknown names yield `None`.
pub fn to_transport_event(
    name: &str,
    args: &[serde_json::Value],
) -> Result<Option<TransportEvent>> {
    let first = args.first();
    let event = match name {
        "message" => {
            let value = first.context("message event without payload")?;
            let msg: Message =
                serde_json::from_value(value.clone()).context("Malformed message payload")?;
            TransportEvent::Message(msg)
        }
        "message-read" => {
            let id = first
                .and_then(|v| v.as_str())
                .context("message-read event without an id")?;
            TransportEvent::MessageRead(id.to_string())
        }
        "typing" => TransportEvent::Typing(bool_arg(first)?),
        "partner-status" => TransportEvent::PartnerStatus(bool_arg(first)?),
        "alert" => TransportEvent::Alert,
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn bool_arg(value: Option<&serde_json::Value>) -> Result<bool> {
    value
        .and_then(|v| v.as_bool())
        .context("expected a boolean payload")
}
