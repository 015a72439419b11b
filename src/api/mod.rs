//! HTTP API client for the chat server

pub mod auth;
pub mod client;
pub mod messages;
pub mod notifications;
pub mod users;

#[cfg(test)]
pub(crate) mod test_server;

use std::future::Future;

use anyhow::Result;

pub use client::{ApiClient, StatusError};

use crate::models::{Message, NewMessage, User};

/// Server calls the chat service depends on.
///
/// [`ApiClient`] is the production implementation.
pub trait MessageBackend: Send + Sync + 'static {
    fn fetch_messages(&self) -> impl Future<Output = Result<Vec<Message>>> + Send;
    fn create_message(&self, draft: &NewMessage) -> impl Future<Output = Result<Message>> + Send;
    fn mark_read(&self, id: &str) -> impl Future<Output = Result<Message>> + Send;
    fn fetch_partner(&self, name: &str) -> impl Future<Output = Result<User>> + Send;
    fn set_online(&self, is_online: bool) -> impl Future<Output = Result<User>> + Send;
}

impl MessageBackend for ApiClient {
    async fn fetch_messages(&self) -> Result<Vec<Message>> {
        messages::list_messages(self).await
    }

    async fn create_message(&self, draft: &NewMessage) -> Result<Message> {
        messages::create_message(self, draft).await
    }

    async fn mark_read(&self, id: &str) -> Result<Message> {
        messages::mark_read(self, id).await
    }

    async fn fetch_partner(&self, name: &str) -> Result<User> {
        users::partner(self, name).await
    }

    async fn set_online(&self, is_online: bool) -> Result<User> {
        users::set_status(self, is_online).await
    }
}
