//! WebSocket connection and Socket.IO handshake

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use super::frame::{self, Packet};
use super::{OutboundEvent, TransportEvent};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ChatSocket {
    stream: WsStream,
    sid: String,
}

/// Build the Engine.IO WebSocket URL for `base` (http(s) is mapped to ws(s)).
pub fn socket_url(base: &str, token: &str) -> Result<url::Url> {
    let base = base
        .replace("https://", "wss://")
        .replace("http://", "ws://");
    let mut url = url::Url::parse(&base).with_context(|| format!("Invalid socket URL {}", base))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket")
        .append_pair("token", token);
    Ok(url)
}

impl ChatSocket {
    /// Connect and complete the Engine.IO open + Socket.IO CONNECT handshake.
    ///
    /// The token travels both in the query string and in the CONNECT
    /// packet's auth payload; servers read one or the other.
    pub async fn connect(base_url: &str, token: &str) -> Result<Self> {
        let url = socket_url(base_url, token)?;
        tracing::info!("Connecting WebSocket to {}", base_url);

        let (stream, response) = connect_async(url.as_str())
            .await
            .context("WebSocket connection failed")?;
        tracing::debug!("WebSocket upgraded (status={})", response.status());

        let mut socket = Self {
            stream,
            sid: String::new(),
        };

        // 1. Engine.IO open packet
        match socket.recv_packet().await? {
            Some(Packet::Open { sid, ping_interval }) => {
                tracing::debug!("Engine.IO open sid={} pingInterval={}ms", sid, ping_interval);
                socket.sid = sid;
            }
            Some(other) => bail!("Expected Engine.IO open packet, got {:?}", other),
            None => bail!("Connection closed before handshake"),
        }

        // 2. Socket.IO CONNECT with auth
        socket.send_text(&frame::encode_connect(token)).await?;
        loop {
            match socket.recv_packet().await? {
                Some(Packet::Connected) => break,
                Some(Packet::ConnectError(msg)) => bail!("Socket connect rejected: {}", msg),
                Some(other) => tracing::debug!("Ignoring pre-connect packet {:?}", other),
                None => bail!("Connection closed during Socket.IO connect"),
            }
        }

        tracing::info!("Socket connected (sid={})", socket.sid);
        Ok(socket)
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    async fn send_text(&mut self, msg: &str) -> Result<()> {
        tracing::trace!("WS send: {}", msg);
        self.stream
            .send(WsMessage::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Emit one chat event.
    pub async fn emit(&mut self, event: &OutboundEvent) -> Result<()> {
        let text = frame::encode_event(event)?;
        self.send_text(&text).await
    }

    /// Receive the next decoded packet, answering Engine.IO and WebSocket pings.
    ///
    /// Returns `Ok(None)` once the peer closes.
    async fn recv_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    tracing::trace!("WS recv: {}", text);
                    let packet = match frame::decode(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!("Dropping undecodable frame: {:#}", e);
                            continue;
                        }
                    };
                    match packet {
                        Packet::Ping => self.send_text(frame::PONG).await?,
                        Packet::Close | Packet::Disconnected => return Ok(None),
                        other => return Ok(Some(other)),
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    self.stream
                        .send(WsMessage::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }

    /// Receive the next chat event, skipping unknown events and control packets.
    pub async fn recv_event(&mut self) -> Result<Option<TransportEvent>> {
        loop {
            let Some(packet) = self.recv_packet().await? else {
                return Ok(None);
            };
            match packet {
                Packet::Event { name, args } => match frame::to_transport_event(&name, &args) {
                    Ok(Some(event)) => return Ok(Some(event)),
                    Ok(None) => tracing::debug!("Ignoring unknown event '{}'", name),
                    Err(e) => tracing::warn!("Malformed '{}' event: {:#}", name, e),
                },
                other => tracing::debug!("Ignoring packet {:?}", other),
            }
        }
    }

    /// Send Socket.IO disconnect and close the WebSocket.
    pub async fn close(mut self) {
        if let Err(e) = self.send_text(frame::DISCONNECT).await {
            tracing::debug!("Disconnect packet not sent: {:#}", e);
        }
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close failed: {:#}", e);
        }
    }
}
