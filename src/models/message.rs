//! Message-related models

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Message payload kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Voice,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
        }
    }
}

/// A persisted chat message.
///
/// `content` is plain text for [`MessageKind::Text`] and a base64 data URL
/// (`data:audio/webm;base64,...`) for [`MessageKind::Voice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "sender")]
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Whether `user_id` authored this message.
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Draft sent to `POST /messages`; the server assigns the id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub sender_name: String,
    #[serde(rename = "sender")]
    pub sender_id: String,
}

impl NewMessage {
    pub fn new(sender: &User, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            content: content.into(),
            kind,
            timestamp: Utc::now(),
            read: false,
            sender_name: sender.name.clone(),
            sender_id: sender.id.clone(),
        }
    }
}

/// Encode recorded audio as the data URL carried in voice message content.
pub fn voice_data_url(mime: &str, audio: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(audio)
    )
}

/// Guess the audio MIME type from a file extension (defaults to webm).
pub fn audio_mime_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("ogg") | Some("oga") | Some("opus") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        _ => "audio/webm",
    }
}
