//! pairchat - terminal client for a two-person private chat
//!
//! Keeps a local copy of the conversation in sync with the HTTP API and a
//! Socket.IO connection, and tracks the partner's presence and typing.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;
pub mod tui;

pub use error::{ChatError, ChatResult};
