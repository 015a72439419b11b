//! Data models shared by the API client, transport and chat store

mod message;
mod user;

pub use message::*;
pub use user::*;
