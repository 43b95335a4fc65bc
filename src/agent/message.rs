//! Chat protocol types and message interpretation.
//!
//! The wire format is deliberately small: a chat message carries an id, a
//! timestamp, the sender's reply endpoint, and free text. Every inbound
//! message is acknowledged immediately; the substantive reply arrives later as
//! a new message POSTed to the sender's endpoint.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::table::DataReference;

/// A chat message, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub msg_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Endpoint replies are POSTed to.
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            msg_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sender: sender.into(),
            text: text.into(),
        }
    }
}

/// Immediate receipt for an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAcknowledgement {
    pub acknowledged_msg_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ChatAcknowledgement {
    pub fn for_message(message: &ChatMessage) -> Self {
        Self {
            acknowledged_msg_id: message.msg_id,
            timestamp: Utc::now(),
        }
    }
}

/// Sent when a message is too short to contain a data reference.
pub const HELP_TEXT: &str = "Send me a data source and I will build a report for you. \
I accept a direct CSV/JSON URL, a Google Sheets link, a local file path, or the raw \
CSV/JSON data pasted into the message.";

/// Minimum message length treated as an actual query.
const MIN_QUERY_LEN: usize = 3;

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Too short to mean anything; answer with [`HELP_TEXT`].
    Help,
    /// Analyze the referenced dataset.
    Analyze(DataReference),
}

/// Interpret the message text. The first URL in the text wins; a message with
/// no URL is treated as a data reference in its own right (inline data or a
/// file path), which [`DataReference::parse`] sorts out.
pub fn interpret(text: &str) -> Intent {
    let trimmed = text.trim();
    if trimmed.len() < MIN_QUERY_LEN {
        return Intent::Help;
    }
    if let Some(url) = first_url(trimmed) {
        return Intent::Analyze(DataReference::parse(&url));
    }
    Intent::Analyze(DataReference::parse(trimmed))
}

fn first_url(text: &str) -> Option<String> {
    // Unwrap is fine: the pattern is a compile-time constant.
    let re = Regex::new(r#"https?://[^\s"'<>]+"#).unwrap();
    re.find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_asks_for_help() {
        assert_eq!(interpret("hi"), Intent::Help);
        assert_eq!(interpret("  \n"), Intent::Help);
    }

    #[test]
    fn url_in_prose_is_extracted() {
        let intent = interpret("please analyze https://example.com/data.csv for me");
        match intent {
            Intent::Analyze(DataReference::RemoteUrl(url)) => {
                assert_eq!(url, "https://example.com/data.csv");
            }
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn trailing_punctuation_stripped_from_url() {
        let intent = interpret("check https://example.com/data.csv, thanks!");
        match intent {
            Intent::Analyze(DataReference::RemoteUrl(url)) => {
                assert_eq!(url, "https://example.com/data.csv");
            }
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn sheets_link_detected() {
        let intent =
            interpret("https://docs.google.com/spreadsheets/d/abc123/edit#gid=5");
        assert!(matches!(
            intent,
            Intent::Analyze(DataReference::GoogleSheet(_))
        ));
    }

    #[test]
    fn inline_csv_passes_through() {
        let intent = interpret("a,b\n1,2");
        assert!(matches!(
            intent,
            Intent::Analyze(DataReference::InlineText(_))
        ));
    }

    #[test]
    fn ack_echoes_message_id() {
        let msg = ChatMessage::new("http://localhost:9999/inbox", "hello there");
        let ack = ChatAcknowledgement::for_message(&msg);
        assert_eq!(ack.acknowledged_msg_id, msg.msg_id);
    }

    #[test]
    fn message_round_trips_through_json() {
        let msg = ChatMessage::new("http://peer/inbox", "a,b\n1,2");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.msg_id, msg.msg_id);
        assert_eq!(back.text, msg.text);
        assert_eq!(back.sender, msg.sender);
    }
}
