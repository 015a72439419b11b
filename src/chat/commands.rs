//! One-shot CLI commands: history, send, alert, listen

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use super::{open, ChatService};
use crate::api::{self, ApiClient, MessageBackend};
use crate::config::Config;
use crate::error::ChatError;
use crate::models::{audio_mime_for, voice_data_url, Message, MessageKind};
use crate::transport::{ConnectionState, Transport, TransportEvent};

/// How long one-shot commands wait for the live connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One line of conversation output.
pub fn format_message(msg: &Message, my_id: &str) -> String {
    let time = msg.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    let body = match msg.kind {
        MessageKind::Text => msg.content.clone(),
        MessageKind::Voice => "[voice message]".to_string(),
    };
    let marker = if !msg.is_from(my_id) {
        ""
    } else if msg.read {
        "  (read)"
    } else {
        "  (sent)"
    };
    format!("[{}] {}: {}{}", time, msg.sender_name, body, marker)
}

/// Print the last `limit` messages of the conversation.
pub async fn history(config: &Config, limit: usize) -> Result<()> {
    let session = config.require_session()?;
    let client = ApiClient::from_config(config)?;
    let messages = api::messages::list_messages(&client).await?;

    if messages.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let skip = messages.len().saturating_sub(limit);
    for msg in &messages[skip..] {
        println!("{}", format_message(msg, session.user_id()));
    }
    Ok(())
}

/// Send a text message.
pub async fn send_text(config: &Config, text: &str) -> Result<()> {
    send_one(config, text.to_string(), MessageKind::Text).await
}

/// Send an audio file as a voice message.
pub async fn send_voice(config: &Config, path: &Path) -> Result<()> {
    let audio = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data_url = voice_data_url(audio_mime_for(path), &audio);
    tracing::debug!("Voice message: {} bytes of audio", audio.len());
    send_one(config, data_url, MessageKind::Voice).await
}

async fn send_one(config: &Config, content: String, kind: MessageKind) -> Result<()> {
    let (service, _events) = open(config).await?;
    wait_connected(service.transport()).await;

    let saved = service.send(&content, kind).await?;
    println!("{}", format_message(&saved, &service.me().id));

    flush_and_close(service.transport()).await;
    Ok(())
}

/// Ping the partner.
pub async fn alert(config: &Config) -> Result<()> {
    let (service, _events) = open(config).await?;
    if !wait_connected(service.transport()).await {
        let reason = "alerts are only sent over a live connection";
        return Err(ChatError::Transport(reason.into()).into());
    }
    service.send_alert();
    flush_and_close(service.transport()).await;
    println!("Alert sent.");
    Ok(())
}

/// Print live conversation events until Ctrl-C or the connection drops.
pub async fn listen(config: &Config) -> Result<()> {
    let (service, mut events) = open(config).await?;

    for msg in service.store().snapshot().iter().rev().take(10).rev() {
        println!("{}", format_message(msg, &service.me().id));
    }
    println!("-- listening (Ctrl-C to quit) --");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let done = event == TransportEvent::Disconnected;
                print_event(&service, &event);
                service.handle_event(event).await;
                if done {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    service.shutdown().await;
    Ok(())
}

fn print_event<B: MessageBackend>(service: &ChatService<B>, event: &TransportEvent) {
    let partner = service
        .presence()
        .partner()
        .map(|p| p.name)
        .unwrap_or_else(|| "Partner".to_string());

    match event {
        TransportEvent::Connected => println!("-- connected --"),
        TransportEvent::Disconnected => println!("-- disconnected --"),
        TransportEvent::Message(msg) => {
            // Duplicates are dropped by the store
            if service.store().get(&msg.id).is_none() {
                println!("{}", format_message(msg, &service.me().id));
            }
        }
        TransportEvent::MessageRead(id) => tracing::debug!("Message {} read", id),
        TransportEvent::Typing(true) => println!("{} is typing...", partner),
        TransportEvent::Typing(false) => {}
        TransportEvent::PartnerStatus(online) => println!(
            "{} is {}",
            partner,
            if *online { "online" } else { "offline" }
        ),
        TransportEvent::Alert => println!("\x07{} is trying to reach you!", partner),
    }
}

/// Wait for the first connection attempt to settle. Returns whether it
/// succeeded.
async fn wait_connected(transport: &Transport) -> bool {
    let mut state = transport.subscribe_state();
    let settled = tokio::time::timeout(
        CONNECT_TIMEOUT,
        state.wait_for(|s| *s != ConnectionState::Connecting),
    )
    .await;

    match settled {
        Ok(Ok(s)) if *s == ConnectionState::Connected => true,
        _ => {
            tracing::warn!("No live connection; the partner will see it on next load");
            false
        }
    }
}

/// Let queued emits go out, then close the socket.
async fn flush_and_close(transport: &Transport) {
    let mut state = transport.subscribe_state();
    transport.disconnect();
    let _ = tokio::time::timeout(
        CONNECT_TIMEOUT,
        state.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await;
}
