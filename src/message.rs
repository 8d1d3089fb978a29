//! Chat message types
//!
//! These types carry no UI framework dependencies so the session reducer and
//! the renderers can share them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id of the seeded welcome message.
pub const WELCOME_ID: &str = "welcome";

/// Content of the seeded welcome message.
pub const WELCOME_TEXT: &str = "# Hello, I'm Erica.\n\
I'm here to help you learn. You can ask me questions, and I'll reply with **rich text**, `code snippets`, or organized lists.\n\
\n\
* **Concept Explanations**\n\
* **Code Review**\n\
* **Study Plans**\n\
\n\
How can I help you today?";

/// Text of the assistant message appended when an exchange fails.
pub const ERROR_TEXT: &str =
    "Error: Failed to connect to the backend. Is your Flask server running on port 5000?";

/// A single entry in the chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    pub fn welcome(now: DateTime<Utc>) -> Self {
        Self {
            id: WELCOME_ID.to_string(),
            role: Role::Assistant,
            content: WELCOME_TEXT.to_string(),
            timestamp: now.timestamp_millis(),
            is_error: false,
        }
    }

    pub fn user(id: String, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::User,
            content,
            timestamp: now.timestamp_millis(),
            is_error: false,
        }
    }

    pub fn assistant(id: String, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content,
            timestamp: now.timestamp_millis(),
            is_error: false,
        }
    }

    pub fn error(id: String, now: DateTime<Utc>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(id, ERROR_TEXT.to_string(), now)
        }
    }

    /// Local wall-clock time the message was created, formatted for display.
    pub fn time_label(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Issues message ids from the creation time in milliseconds.
///
/// Two messages created within the same millisecond still get distinct,
/// increasing ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdClock {
    last: i64,
}

impl IdClock {
    pub fn next(&mut self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        self.last = if millis > self.last { millis } else { self.last + 1 };
        self.last.to_string()
    }
}
