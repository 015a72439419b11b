//! Message history, creation and read receipts

use anyhow::{Context, Result};

use super::client::ApiClient;
use crate::models::{Message, NewMessage};

/// `GET /messages`: the full conversation history, in server order.
pub async fn list_messages(client: &ApiClient) -> Result<Vec<Message>> {
    let resp = client.get("/messages").await?;
    resp.json()
        .await
        .context("Failed to parse messages response")
}

/// `POST /messages`: persist a draft and return the saved message with its id.
pub async fn create_message(client: &ApiClient, draft: &NewMessage) -> Result<Message> {
    let body = serde_json::to_value(draft).context("Failed to encode message")?;
    let resp = client.post("/messages", &body).await?;
    let saved: Message = resp
        .json()
        .await
        .context("Failed to parse saved message")?;
    tracing::debug!("Message persisted id={}", saved.id);
    Ok(saved)
}

/// `PATCH /messages/:id/read`
pub async fn mark_read(client: &ApiClient, id: &str) -> Result<Message> {
    let path = format!("/messages/{}/read", encode_segment(id));
    let resp = client.patch(&path, &serde_json::json!({})).await?;
    resp.json()
        .await
        .context("Failed to parse read-receipt response")
}

/// Percent-encode one path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
