//! Chat-facing surface: message types, intent interpretation, and the HTTP
//! adapter that turns inbound messages into pipeline runs.

pub mod message;
pub mod server;

pub use message::{ChatAcknowledgement, ChatMessage, HELP_TEXT};
pub use server::{ServerConfig, start_server};
