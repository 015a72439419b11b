//! Conversation state and its synchronization with the server

pub mod commands;
pub mod presence;
pub mod service;
pub mod store;

pub use presence::{Alert, PresenceTracker};
pub use service::ChatService;
pub use store::ConversationStore;

use tokio::sync::mpsc;

use crate::api::ApiClient;
use crate::config::Config;
use crate::transport::{Transport, TransportEvent};

/// Wire up a chat service for the stored session and load history.
///
/// The transport starts connecting immediately. Inbound events queue on the
/// returned receiver until the caller hands it to [`ChatService::run`], so
/// nothing live is lost to the history load.
pub async fn open(
    config: &Config,
) -> anyhow::Result<(ChatService<ApiClient>, mpsc::UnboundedReceiver<TransportEvent>)> {
    let session = config.require_session()?;
    let client = ApiClient::with_session(config.api_base(), session);
    let (transport, events) = Transport::start(&config.socket_url, &session.token);

    let service = ChatService::new(client, session, transport);
    let history = service.load_initial().await?;
    tracing::debug!("Loaded {} messages", history.len());

    match config.partner_name.as_deref() {
        Some(name) => {
            if let Err(e) = service.load_partner(name).await {
                tracing::warn!("Could not look up partner {}: {}", name, e);
            }
        }
        None => tracing::warn!(
            "No partner configured; presence is unknown until 'pairchat login --partner <name>'"
        ),
    }

    Ok((service, events))
}
