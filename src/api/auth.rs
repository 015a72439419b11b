//! Login endpoint

use anyhow::Context;
use serde::Deserialize;

use super::client::{ApiClient, StatusError};
use crate::error::{ChatError, ChatResult};
use crate::models::User;

const LOGIN_FAILED: &str = "Login failed. Please try again.";

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// `POST /auth/login`: exchange display name and secret code for a session.
///
/// Rejections come back as [`ChatError::Auth`] carrying the server's message.
pub async fn login(client: &ApiClient, name: &str, code: &str) -> ChatResult<LoginResponse> {
    let body = serde_json::json!({ "name": name, "userId": code });
    let resp = client.post("/auth/login", &body).await.map_err(|e| {
        tracing::debug!("Login request failed: {:#}", e);
        ChatError::Auth(login_failure_message(&e))
    })?;

    resp.json()
        .await
        .context("Failed to parse login response")
        .map_err(ChatError::Http)
}

/// User-facing text for a failed login.
fn login_failure_message(err: &anyhow::Error) -> String {
    err.downcast_ref::<StatusError>()
        .and_then(|s| s.server_message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| LOGIN_FAILED.to_string())
}
