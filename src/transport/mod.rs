//! Real-time transport: one authenticated Socket.IO connection per session
//!
//! The connection lives in a background task. The UI and chat service talk to
//! it through a cloneable [`Transport`] handle; inbound events arrive on the
//! receiver returned by [`Transport::start`].

pub mod frame;
pub mod socket;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::models::Message;
use socket::ChatSocket;

/// Events produced by the transport task.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed (initial connect or manual reconnect).
    Connected,
    /// Connection lost or closed.
    Disconnected,
    /// New message from the peer, or an echo of one we sent.
    Message(Message),
    /// The peer read the message with this id.
    MessageRead(String),
    Typing(bool),
    PartnerStatus(bool),
    /// Out-of-band attention ping from the peer.
    Alert,
}

/// Events the client emits to the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Message(Message),
    MessageRead(String),
    Typing(bool),
    Alert,
}

impl OutboundEvent {
    /// Socket.IO event name.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Message(_) => "message",
            OutboundEvent::MessageRead(_) => "message-read",
            OutboundEvent::Typing(_) => "typing",
            OutboundEvent::Alert => "alert",
        }
    }
}

/// Connection lifecycle as observed by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
        }
    }
}

/// Commands sent from the handle to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Emit(OutboundEvent),
    Reconnect,
    Disconnect,
}

/// Why the connected phase ended.
enum DisconnectReason {
    /// Every handle was dropped. Stop the task.
    Shutdown,
    /// `disconnect()` was called.
    Requested,
    /// Server close or I/O error.
    Lost,
}

/// Handle to the background connection task.
#[derive(Clone)]
pub struct Transport {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    connections: Arc<AtomicUsize>,
}

impl Transport {
    /// Spawn the connection task and start connecting to `url` with `token`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(url: &str, token: &str) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let connections = Arc::new(AtomicUsize::new(0));

        tokio::spawn(connection_loop(
            url.to_string(),
            token.to_string(),
            cmd_rx,
            event_tx,
            state_tx,
            Arc::clone(&connections),
        ));

        (
            Self {
                cmd_tx,
                state: state_rx,
                connections,
            },
            event_rx,
        )
    }

    /// A handle wired to a bare command channel instead of a socket.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        (
            Self {
                cmd_tx,
                state: state_rx,
                connections: Arc::new(AtomicUsize::new(1)),
            },
            cmd_rx,
        )
    }

    /// Queue an event for the peer. Dropped if the connection is down.
    pub fn emit(&self, event: OutboundEvent) {
        self.command(Command::Emit(event));
    }

    /// Reopen the connection if it is currently disconnected; no-op otherwise.
    pub fn reconnect(&self) {
        if self.state() != ConnectionState::Disconnected {
            tracing::debug!("Reconnect ignored: transport is {}", self.state().as_str());
            return;
        }
        self.command(Command::Reconnect);
    }

    /// Close the connection. A later `reconnect()` reopens it.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Number of successful handshakes made by this transport.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn command(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Transport task stopped -- command dropped");
        }
    }
}

/// Background task: connect, pump events, then idle until told to reconnect.
///
/// There is no automatic retry; a lost connection stays down until
/// `reconnect()` is called.
async fn connection_loop(
    url: String,
    token: String,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    connections: Arc<AtomicUsize>,
) {
    let mut should_connect = true;

    loop {
        if should_connect {
            should_connect = false;
            state_tx.send_replace(ConnectionState::Connecting);

            match ChatSocket::connect(&url, &token).await {
                Ok(socket) => {
                    connections.fetch_add(1, Ordering::SeqCst);
                    state_tx.send_replace(ConnectionState::Connected);
                    let _ = event_tx.send(TransportEvent::Connected);

                    let reason = run_connected(socket, &mut cmd_rx, &event_tx).await;

                    state_tx.send_replace(ConnectionState::Disconnected);
                    let _ = event_tx.send(TransportEvent::Disconnected);

                    match reason {
                        DisconnectReason::Shutdown => return,
                        DisconnectReason::Requested => tracing::info!("Disconnected"),
                        DisconnectReason::Lost => {
                            tracing::warn!("Connection lost. Reconnect manually.")
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Socket connection failed: {:#}", e);
                    state_tx.send_replace(ConnectionState::Disconnected);
                    let _ = event_tx.send(TransportEvent::Disconnected);
                }
            }
        }

        match cmd_rx.recv().await {
            None => return,
            Some(Command::Reconnect) => {
                tracing::info!("Reconnecting...");
                should_connect = true;
            }
            Some(Command::Disconnect) => {}
            Some(Command::Emit(event)) => {
                tracing::debug!("Not connected -- dropping outbound '{}'", event.name());
            }
        }
    }
}

async fn run_connected(
    mut socket: ChatSocket,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> DisconnectReason {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Emit(event)) => {
                    if let Err(e) = socket.emit(&event).await {
                        tracing::warn!("Emit '{}' failed: {:#}", event.name(), e);
                        return DisconnectReason::Lost;
                    }
                }
                Some(Command::Reconnect) => {
                    tracing::debug!("Reconnect ignored: already connected");
                }
                Some(Command::Disconnect) => {
                    socket.close().await;
                    return DisconnectReason::Requested;
                }
                None => {
                    socket.close().await;
                    return DisconnectReason::Shutdown;
                }
            },
            incoming = socket.recv_event() => match incoming {
                Ok(Some(event)) => {
                    if event_tx.send(event).is_err() {
                        tracing::debug!("Event receiver dropped");
                    }
                }
                Ok(None) => {
                    tracing::info!("Server closed the connection (sid={})", socket.sid());
                    return DisconnectReason::Lost;
                }
                Err(e) => {
                    tracing::warn!("Socket receive failed: {:#}", e);
                    return DisconnectReason::Lost;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    /// Minimal Socket.IO server: handshake, push `pushed`, then forward every
    /// text frame it receives to the returned channel.
    async fn spawn_server(
        pushed: Vec<String>,
    ) -> (String, Arc<AtomicUsize>, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let accepted_clone = Arc::clone(&accepted);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                accepted_clone.fetch_add(1, Ordering::SeqCst);
                let pushed = pushed.clone();
                let frames_tx = frames_tx.clone();
                tokio::spawn(async move {
                    let mut ws = accept_async(tcp).await.unwrap();
                    ws.send(WsMessage::Text(
                        r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#
                            .into(),
                    ))
                    .await
                    .unwrap();
                    // Expect CONNECT with auth
                    if let Some(Ok(WsMessage::Text(t))) = ws.next().await {
                        let _ = frames_tx.send(t);
                    }
                    ws.send(WsMessage::Text(r#"40{"sid":"n1"}"#.into()))
                        .await
                        .unwrap();
                    ws.send(WsMessage::Text("2".into())).await.unwrap();
                    for frame in pushed {
                        ws.send(WsMessage::Text(frame)).await.unwrap();
                    }
                    while let Some(Ok(msg)) = ws.next().await {
                        if let WsMessage::Text(t) = msg {
                            let _ = frames_tx.send(t);
                        }
                    }
                });
            }
        });

        (format!("ws://127.0.0.1:{}", port), accepted, frames_rx)
    }

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("server channel closed")
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("transport channel closed")
    }

    #[tokio::test]
    async fn test_connect_receive_and_emit() {
        let (url, _accepted, mut frames) = spawn_server(vec![
            r#"42["partner-status",true]"#.into(),
            r#"42["typing",true]"#.into(),
        ])
        .await;

        let (transport, mut events) = Transport::start(&url, "secret");

        assert_eq!(next_frame(&mut frames).await, r#"40{"token":"secret"}"#);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        // Engine.IO ping is answered before events are delivered
        assert_eq!(next_frame(&mut frames).await, "3");
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::PartnerStatus(true)
        );
        assert_eq!(next_event(&mut events).await, TransportEvent::Typing(true));

        transport.emit(OutboundEvent::Alert);
        assert_eq!(next_frame(&mut frames).await, r#"42["alert"]"#);
        assert_eq!(transport.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_reconnect_when_connected_is_noop() {
        let (url, accepted, mut frames) = spawn_server(vec![]).await;
        let (transport, mut events) = Transport::start(&url, "t");

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        let _auth = next_frame(&mut frames).await;
        let _pong = next_frame(&mut frames).await;

        transport.reconnect();
        // Commands are processed in order, so once this emit arrives the
        // reconnect has already been handled.
        transport.emit(OutboundEvent::Typing(true));
        assert_eq!(next_frame(&mut frames).await, r#"42["typing",true]"#);

        assert_eq!(transport.connection_count(), 1);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disconnect_then_reconnect() {
        let (url, accepted, mut frames) = spawn_server(vec![]).await;
        let (transport, mut events) = Transport::start(&url, "t");
        let mut state = transport.subscribe_state();

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        let _auth = next_frame(&mut frames).await;
        assert_eq!(next_frame(&mut frames).await, "3");

        transport.disconnect();
        assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(next_frame(&mut frames).await, "41");

        transport.reconnect();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(transport.connection_count(), 2);
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let (transport, mut events) = Transport::start(&format!("ws://127.0.0.1:{}", port), "t");
        let mut state = transport.subscribe_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConnectionState::Disconnected),
        )
        .await
        .expect("timed out")
        .unwrap();
        assert_eq!(transport.connection_count(), 0);

        // Event readers learn about the failed attempt too
        assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);

        // A manual retry fails the same way and reports again
        transport.reconnect();
        assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
        assert_eq!(transport.connection_count(), 0);
    }
}
