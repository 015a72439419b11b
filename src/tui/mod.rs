//! TUI module for pairchat
//!
//! Full-screen conversation view using Ratatui.

mod app;
mod backend;
mod compose;
mod log_capture;
mod messages;
mod ui;

pub use app::run;
pub use log_capture::LogBuffer;
