//! Partner presence, typing and alert signals
//!
//! Presence is a held value (last write wins). Typing and alerts are
//! momentary: nothing is stored, late subscribers miss earlier signals.

use tokio::sync::{broadcast, watch};

use crate::models::User;

const SIGNAL_CAPACITY: usize = 32;

/// An attention ping from the partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Partner's display name, or a generic label if unknown.
    pub from: String,
}

#[derive(Clone)]
pub struct PresenceTracker {
    online: watch::Sender<bool>,
    partner: watch::Sender<Option<User>>,
    typing: broadcast::Sender<bool>,
    alerts: broadcast::Sender<Alert>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            online: watch::channel(false).0,
            partner: watch::channel(None).0,
            typing: broadcast::channel(SIGNAL_CAPACITY).0,
            alerts: broadcast::channel(SIGNAL_CAPACITY).0,
        }
    }

    pub fn set_partner_online(&self, is_online: bool) {
        self.online.send_replace(is_online);
        self.partner.send_if_modified(|p| match p {
            Some(user) if user.is_online != is_online => {
                user.is_online = is_online;
                true
            }
            _ => false,
        });
    }

    pub fn partner_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn subscribe_partner_online(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Record the partner and seed presence from its `is_online` flag.
    pub fn set_partner(&self, partner: User) {
        self.online.send_replace(partner.is_online);
        self.partner.send_replace(Some(partner));
    }

    pub fn partner(&self) -> Option<User> {
        self.partner.borrow().clone()
    }

    pub fn subscribe_partner(&self) -> watch::Receiver<Option<User>> {
        self.partner.subscribe()
    }

    pub fn notify_typing(&self, is_typing: bool) {
        // No receivers is fine: the signal is simply lost.
        let _ = self.typing.send(is_typing);
    }

    pub fn subscribe_typing(&self) -> broadcast::Receiver<bool> {
        self.typing.subscribe()
    }

    /// Forward an alert, labelled with the partner's name when known.
    pub fn notify_alert(&self) -> Alert {
        let from = self
            .partner()
            .map(|p| p.name)
            .unwrap_or_else(|| "Your partner".to_string());
        let alert = Alert { from };
        let _ = self.alerts.send(alert.clone());
        alert
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(online: bool) -> User {
        User {
            id: "u2".into(),
            name: "Safa".into(),
            is_online: online,
        }
    }

    #[test]
    fn test_presence_last_write_wins() {
        let tracker = PresenceTracker::new();
        assert!(!tracker.partner_online());
        tracker.set_partner_online(true);
        tracker.set_partner_online(false);
        assert!(!tracker.partner_online());
        tracker.set_partner_online(true);
        assert!(tracker.partner_online());
    }

    #[test]
    fn test_partner_seeds_presence() {
        let tracker = PresenceTracker::new();
        tracker.set_partner(partner(true));
        assert!(tracker.partner_online());

        tracker.set_partner_online(false);
        assert!(!tracker.partner().unwrap().is_online);
    }

    #[tokio::test]
    async fn test_typing_is_transient() {
        let tracker = PresenceTracker::new();
        tracker.notify_typing(true);

        let mut rx = tracker.subscribe_typing();
        assert!(rx.try_recv().is_err());

        tracker.notify_typing(true);
        tracker.notify_typing(false);
        assert!(rx.recv().await.unwrap());
        assert!(!rx.recv().await.unwrap());
    }

    #[tokio::test]
    async fn test_alert_names_partner() {
        let tracker = PresenceTracker::new();
        let mut rx = tracker.subscribe_alerts();

        tracker.notify_alert();
        assert_eq!(rx.recv().await.unwrap().from, "Your partner");

        tracker.set_partner(partner(false));
        tracker.notify_alert();
        assert_eq!(rx.recv().await.unwrap().from, "Safa");
    }
}
