//! User presence and partner lookup

use anyhow::{Context, Result};

use super::client::ApiClient;
use super::messages::encode_segment;
use crate::models::User;

/// `POST /users/status`: publish the local user's online flag.
pub async fn set_status(client: &ApiClient, is_online: bool) -> Result<User> {
    let body = serde_json::json!({ "isOnline": is_online });
    let resp = client.post("/users/status", &body).await?;
    resp.json()
        .await
        .context("Failed to parse status response")
}

/// `GET /users/partner/:name`
pub async fn partner(client: &ApiClient, name: &str) -> Result<User> {
    let path = format!("/users/partner/{}", encode_segment(name));
    let resp = client.get(&path).await?;
    resp.json()
        .await
        .with_context(|| format!("Failed to parse partner '{}'", name))
}
