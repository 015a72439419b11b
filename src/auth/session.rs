//! Session context and client lifecycle

use serde::{Deserialize, Serialize};

use crate::models::User;

/// An authenticated login: the bearer token and who it belongs to.
///
/// Passed explicitly to the API client, transport and chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn new(token: String, user: User) -> Self {
        Self { token, user }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Client lifecycle.
///
/// `LoggedOut -> Authenticating -> Connected <-> Disconnected`, and logout
/// returns to `LoggedOut` from anywhere. A stored token is only confirmed by
/// the first socket handshake, so a transport failure while authenticating
/// lands in `Disconnected` rather than `LoggedOut`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    LoggedOut,
    Authenticating,
    Connected,
    Disconnected,
}

/// Inputs that move the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoginStarted,
    LoginSucceeded,
    LoginFailed,
    TransportLost,
    TransportRestored,
    Logout,
}

impl SessionState {
    /// Apply `event`, or `None` if it is not legal in this state.
    pub fn transition(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (_, Logout) => Some(LoggedOut),
            (LoggedOut, LoginStarted) => Some(Authenticating),
            (Authenticating, LoginSucceeded) => Some(Connected),
            (Authenticating, LoginFailed) => Some(LoggedOut),
            (Authenticating, TransportLost) => Some(Disconnected),
            (Connected | Disconnected, TransportLost) => Some(Disconnected),
            (Connected | Disconnected, TransportRestored) => Some(Connected),
            _ => None,
        }
    }

    /// Apply `event` in place, logging and ignoring illegal moves.
    pub fn apply(&mut self, event: SessionEvent) {
        match self.transition(event) {
            Some(next) => {
                if next != *self {
                    tracing::debug!("Session {:?} -> {:?}", self, next);
                }
                *self = next;
            }
            None => tracing::warn!("Ignoring {:?} in session state {:?}", event, self),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Disconnected)
    }

    /// Only a dropped session may ask the transport to reconnect.
    pub fn can_reconnect(&self) -> bool {
        *self == SessionState::Disconnected
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::LoggedOut => "Logged out",
            SessionState::Authenticating => "Signing in",
            SessionState::Connected => "Connected",
            SessionState::Disconnected => "Disconnected",
        }
    }
}
