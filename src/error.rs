//! Typed failures surfaced to the UI

/// Errors from chat operations the UI reacts to.
///
/// Everything else (config I/O, CLI plumbing) stays in `anyhow`.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Login rejected; the message is shown to the user verbatim.
    #[error("{0}")]
    Auth(String),

    /// Persisting an outgoing message failed. Nothing was added locally.
    #[error("failed to send message: {0:#}")]
    Send(#[source] anyhow::Error),

    /// Marking a message read on the server failed.
    #[error("failed to mark message {id} as read: {source:#}")]
    MarkRead {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// No live socket for an operation that only travels over it.
    #[error("socket unavailable: {0}")]
    Transport(String),

    #[error("not logged in. Run 'pairchat login' first.")]
    NotLoggedIn,

    #[error("message is empty")]
    EmptyMessage,

    /// Any other HTTP failure (history, partner lookup, status update).
    #[error(transparent)]
    Http(#[from] anyhow::Error),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;
