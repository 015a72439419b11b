//! Authenticated HTTP client for the chat API
//!
//! Wraps reqwest::Client with base URL handling and bearer token injection.

use anyhow::{Context, Result};
use reqwest::Method;

use crate::auth::Session;
use crate::config::Config;

/// HTTP client bound to one API base URL and (after login) one session token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Anonymous client, used for the login call.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Client carrying the session's bearer token on every request.
    pub fn with_session(base_url: &str, session: &Session) -> Self {
        Self {
            token: Some(session.token.clone()),
            ..Self::new(base_url)
        }
    }

    /// Client for the stored session in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let session = config.require_session()?;
        Ok(Self::with_session(config.api_base(), session))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut req = self.http.request(method.clone(), &url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        check_response(resp, &url).await
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        self.request(Method::DELETE, path, None).await
    }
}

/// Pull `{"message": "..."}` out of an error body, if the server sent one.
pub fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(String::from)
}

/// Non-success HTTP status from the API.
#[derive(Debug, thiserror::Error)]
#[error("HTTP {status} for {url}: {detail}")]
pub struct StatusError {
    pub status: u16,
    pub url: String,
    pub detail: String,
    /// `message` field of a JSON error body
    pub server_message: Option<String>,
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let server_message = server_message(&body);
    let mut detail = server_message.clone().unwrap_or(body);
    if status == reqwest::StatusCode::UNAUTHORIZED {
        detail.push_str(" (session may be invalid -- run 'pairchat login')");
    }

    Err(StatusError {
        status: status.as_u16(),
        url: url.to_string(),
        detail,
        server_message,
    }
    .into())
}
