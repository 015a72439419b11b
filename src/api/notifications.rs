//! Push notification subscription
//!
//! Failures here never block login or logout; callers only log them.

use anyhow::Result;

use super::client::ApiClient;
use crate::config::PushSubscription;

/// `POST /notifications/subscribe`
pub async fn subscribe(client: &ApiClient, subscription: &PushSubscription) -> Result<()> {
    client
        .post("/notifications/subscribe", &subscription.to_json())
        .await?;
    tracing::info!("Subscription added successfully");
    Ok(())
}

/// `DELETE /notifications/unsubscribe`
pub async fn unsubscribe(client: &ApiClient) -> Result<()> {
    client.delete("/notifications/unsubscribe").await?;
    tracing::info!("Unsubscribed from notifications");
    Ok(())
}

/// Subscribe if a push subscription is configured, logging any failure.
pub async fn subscribe_best_effort(client: &ApiClient, subscription: Option<&PushSubscription>) {
    let Some(subscription) = subscription else {
        tracing::debug!("No [push] subscription configured; skipping");
        return;
    };
    if let Err(e) = subscribe(client, subscription).await {
        tracing::error!("Could not subscribe to notifications: {:#}", e);
    }
}

/// Unsubscribe, logging any failure.
pub async fn unsubscribe_best_effort(client: &ApiClient) {
    if let Err(e) = unsubscribe(client).await {
        tracing::error!("Error unsubscribing from notifications: {:#}", e);
    }
}
