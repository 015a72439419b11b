//! Async backend: bridges the TUI event loop with the chat service.
//!
//! Uses an mpsc channel pair. The TUI sends `BackendCommand` values, and a
//! background tokio task executes them against the [`ChatService`] and sends
//! `BackendResponse` values back.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::MessageBackend;
use crate::chat::ChatService;
use crate::error::ChatResult;
use crate::models::{Message, MessageKind};

/// Commands sent from the TUI event loop to the async backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    SendMessage(String),
    Typing(bool),
    Alert,
    Reconnect,
}

/// Responses from the async backend to the TUI.
#[derive(Debug)]
pub enum BackendResponse {
    MessageSent(ChatResult<Message>),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the backend. Spawns a tokio task that processes commands.
    pub fn start<B: MessageBackend>(service: Arc<ChatService<B>>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(service, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Receive a response from the backend.
    ///
    /// Returns `None` only when the backend task has exited. Designed to be
    /// used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

async fn backend_loop<B: MessageBackend>(
    service: Arc<ChatService<B>>,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            // Sends run on their own task so a slow POST doesn't hold up
            // typing signals queued behind it.
            BackendCommand::SendMessage(text) => {
                let service = Arc::clone(&service);
                let resp_tx = resp_tx.clone();
                tokio::spawn(async move {
                    let result = service.send(&text, MessageKind::Text).await;
                    let _ = resp_tx.send(BackendResponse::MessageSent(result));
                });
            }
            BackendCommand::Typing(is_typing) => service.send_typing(is_typing),
            BackendCommand::Alert => service.send_alert(),
            BackendCommand::Reconnect => service.transport().reconnect(),
        }
    }
}
